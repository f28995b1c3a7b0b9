//! Prompt construction for both extraction stages

use creditseer_domain::{Block, ChunkType, OutputMode};
use creditseer_schema::{FieldSpec, Stage1Schema, Stage2Schema};
use serde_json::{json, Value};
use std::fmt::Write;

/// System instruction shared by both stages
pub const SYSTEM_PROMPT: &str =
    "You are an expert legal document analyst specializing in credit agreements.";

/// Marker the model uses for a block or field that is absent
pub const NOT_FOUND: &str = "Not Found";

const RULE: &str = "────────────────────────────────────────";

/// Builds the Stage 1 block isolation prompt for one chunk window
pub struct Stage1PromptBuilder<'a> {
    chunk_type: ChunkType,
    title: &'a str,
    text: &'a str,
    schema: &'a Stage1Schema,
    window: Option<(usize, usize)>,
}

impl<'a> Stage1PromptBuilder<'a> {
    /// Create a builder for `text` under `schema`
    pub fn new(chunk_type: ChunkType, title: &'a str, text: &'a str, schema: &'a Stage1Schema) -> Self {
        Self {
            chunk_type,
            title,
            text,
            schema,
            window: None,
        }
    }

    /// Mark the text as window `index` (1-based) of `total`
    pub fn with_window(mut self, index: usize, total: usize) -> Self {
        if total > 1 {
            self.window = Some((index, total));
        }
        self
    }

    /// Build the complete prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(STAGE1_INSTRUCTIONS);
        prompt.push_str("\n\n");

        section(&mut prompt, "SCHEMA CONTEXT");
        let _ = writeln!(prompt, "Chunk Type: {}", self.chunk_type);
        let _ = writeln!(prompt, "Chunk Title: {}", self.title);
        if let Some((index, total)) = self.window {
            let _ = writeln!(
                prompt,
                "Window: part {} of {} of this chunk. Report only blocks whose text is in this part.",
                index, total
            );
        }
        prompt.push_str("\nSTAGE 1 SCHEMA:\n");
        prompt.push_str(&format_stage1_schema(self.schema));
        prompt.push('\n');

        section(&mut prompt, "DOCUMENT CHUNK");
        prompt.push_str(self.text);
        prompt.push_str("\n\n");

        prompt.push_str(STAGE1_OUTPUT);
        prompt
    }
}

/// Builds the Stage 2 value extraction prompt for a batch of blocks
pub struct Stage2PromptBuilder<'a> {
    schema: &'a Stage2Schema,
    blocks: Vec<&'a Block>,
}

impl<'a> Stage2PromptBuilder<'a> {
    /// Create a builder for `blocks` under `schema`
    pub fn new(schema: &'a Stage2Schema, blocks: Vec<&'a Block>) -> Self {
        Self { schema, blocks }
    }

    /// Build the complete prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(STAGE2_INSTRUCTIONS);
        prompt.push_str("\n\n");

        section(&mut prompt, "STAGE 2 SCHEMA");
        let mut value_types: Vec<&str> = self.blocks.iter().map(|b| b.value_type.as_str()).collect();
        value_types.sort_unstable();
        value_types.dedup();
        for value_type in value_types {
            if let Some(fields) = self.schema.fields_for(value_type) {
                let _ = writeln!(prompt, "ValueType: {}", value_type);
                prompt.push_str(&format_fields(fields));
            }
        }
        let taxonomy: Vec<&str> = self
            .schema
            .confidence_taxonomy
            .iter()
            .map(|c| c.as_str())
            .collect();
        let _ = writeln!(prompt, "Allowed confidence values: {}\n", taxonomy.join(", "));

        section(&mut prompt, "INPUT BLOCKS");
        for block in &self.blocks {
            let _ = writeln!(prompt, "BlockId: {}", block.block_id);
            let _ = writeln!(prompt, "ValueType: {}", block.value_type);
            let _ = writeln!(prompt, "BlockText: {}\n", block.text);
        }

        prompt.push_str(STAGE2_OUTPUT);
        prompt
    }
}

/// JSON schema for the Stage 1 response
pub fn stage1_response_schema(schema: &Stage1Schema) -> Value {
    let value_types: Vec<&str> = schema.value_types().into_iter().collect();
    json!({
        "type": "object",
        "properties": {
            "blocks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "blockId": { "type": "string" },
                        "valueType": { "type": "string", "enum": value_types },
                        "text": { "type": "string" }
                    },
                    "required": ["blockId", "valueType", "text"]
                }
            }
        },
        "required": ["blocks"]
    })
}

/// JSON schema for the Stage 2 response
pub fn stage2_response_schema(schema: &Stage2Schema) -> Value {
    let taxonomy: Vec<&str> = schema
        .confidence_taxonomy
        .iter()
        .map(|c| c.as_str())
        .collect();
    json!({
        "type": "object",
        "properties": {
            "values": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "blockId": { "type": "string" },
                        "field": { "type": "string" },
                        "value": { "type": "string" },
                        "confidence": { "type": "string", "enum": taxonomy }
                    },
                    "required": ["blockId", "field", "value", "confidence"]
                }
            }
        },
        "required": ["values"]
    })
}

fn section(prompt: &mut String, heading: &str) {
    let _ = writeln!(prompt, "{RULE}\n{heading}\n{RULE}");
}

fn format_stage1_schema(schema: &Stage1Schema) -> String {
    let mut out = String::new();
    for block in &schema.blocks {
        let _ = writeln!(out, "BlockId: {}", block.block_id);
        let _ = writeln!(out, "Label: {}", block.label);
        let _ = writeln!(out, "ValueType: {}", block.value_type);
        let _ = writeln!(out, "AnchorPattern: {}\n", block.anchor_pattern.as_deref().unwrap_or(""));
    }
    out
}

fn format_fields(fields: &[FieldSpec]) -> String {
    let mut out = String::new();
    for field in fields {
        let hint = &field.extraction_hint;
        let _ = writeln!(out, "FieldName: {}", field.name);
        let _ = writeln!(out, "  Pattern: {}", hint.pattern.as_deref().unwrap_or(""));
        let _ = writeln!(out, "  Type: {}", hint.hint_type.as_str());
        let _ = writeln!(out, "  Notes: {}", hint.notes.as_deref().unwrap_or(""));
        if field.output_mode == OutputMode::Summarized {
            out.push_str("  OutputMode: summarized\n");
            out.push_str(
                "  CRITICAL: This field REQUIRES a CONCISE SUMMARY, NOT verbatim text. \
                 Preserve all material calculation mechanics.\n",
            );
        }
        if field.collect_multiple {
            out.push_str("  CollectMultiple: true\n");
        }
        out.push('\n');
    }
    out
}

const STAGE1_INSTRUCTIONS: &str = r#"Your task is to IDENTIFY AND ISOLATE legally meaningful text blocks from the provided document chunk.

This is STAGE 1 of a two-stage extraction system.

CRITICAL RULES (STAGE 1)
1. Extract ONLY text that is explicitly present in the chunk. Never hallucinate.
2. Do NOT extract individual values (dates, amounts, ratios, etc.).
3. Your goal is ONLY to extract full, verbatim BLOCK TEXT.
4. Extract ONLY the blocks defined in the schema.
5. If a block is not present in the chunk, return "Not Found" as its text.
6. A block may contain a table, schedule, formula, list or conditional clause following the text.
7. A block ends ONLY when a new section or covenant begins.

BLOCK IDENTIFICATION GUIDANCE
- Anchor patterns are hints and may appear in different forms.
- Do NOT rely on section numbers.
- Column headers such as "Last day of Test Period" do NOT indicate a new block.
- Tables and schedules following phrases like "set forth below" are part of the same block.
- A value type may occur in several blocks; report each occurrence separately."#;

const STAGE1_OUTPUT: &str = r#"OUTPUT REQUIREMENTS
Return a JSON object only, no commentary:
{"blocks": [{"blockId": "<blockId>", "valueType": "<valueType>", "text": "<verbatim text or Not Found>"}]}

Copy block text exactly as written, including line breaks and table rows."#;

const STAGE2_INSTRUCTIONS: &str = r#"Your task is to EXTRACT STRUCTURED VALUES from previously isolated legal text blocks.

This is STAGE 2 of a two-stage extraction system.

CRITICAL RULES (STAGE 2)
1. Extract values ONLY from the provided block text. Never use text outside the block.
2. Never infer missing values. Do NOT mix values across blocks.
3. Use schema extraction hints as guidance, not strict regex rules.
4. Each value is verbatim text from the block, a CONCISE SUMMARY when the field is summarized, or "Not Found".
5. Report every field of the block's ValueType, even when it is "Not Found".

BLOCK ROUTING RULE
Match each block's ValueType to its schema section and extract ONLY the fields defined for it.

SUMMARIZED FIELDS
Use ONLY information explicitly present in the block. Preserve calculation mechanics, fallbacks and key components. Do not introduce numbers that are not in the block.

TABLE EXTRACTION RULE
Treat column headers as labels, not values. Extract row by row and preserve row order."#;

const STAGE2_OUTPUT: &str = r#"OUTPUT REQUIREMENTS
Return a JSON object only, no commentary:
{"values": [{"blockId": "<blockId>", "field": "<field name>", "value": "<value or Not Found>", "confidence": "<confidence>"}]}

For fields marked CollectMultiple, emit one entry per value, repeating the field name."#;

#[cfg(test)]
mod tests {
    use super::*;
    use creditseer_domain::{BlockRef, Span};
    use creditseer_schema::SchemaRegistry;

    fn block(id: &str, value_type: &str, text: &str) -> Block {
        Block {
            block_ref: BlockRef {
                chunk_index: 1,
                block_index: 0,
            },
            block_id: id.to_string(),
            value_type: value_type.to_string(),
            text: text.to_string(),
            span: Span::new(0, text.len()),
        }
    }

    #[test]
    fn test_stage1_prompt_contents() {
        let registry = SchemaRegistry::builtin().unwrap();
        let schema = registry.stage1(ChunkType::Definitions).unwrap();
        let prompt = Stage1PromptBuilder::new(
            ChunkType::Definitions,
            "ARTICLE I DEFINITIONS",
            "\"Borrower\" means Acme.",
            schema,
        )
        .build();

        assert!(prompt.contains("Chunk Type: definitions"));
        assert!(prompt.contains("Chunk Title: ARTICLE I DEFINITIONS"));
        assert!(prompt.contains("\"Borrower\" means Acme."));
        assert!(prompt.contains("ValueType: definition_clause"));
        assert!(prompt.contains("\"blocks\""));
        assert!(!prompt.contains("Window:"));
    }

    #[test]
    fn test_stage1_prompt_window_note() {
        let registry = SchemaRegistry::builtin().unwrap();
        let schema = registry.stage1(ChunkType::Credits).unwrap();
        let single = Stage1PromptBuilder::new(ChunkType::Credits, "t", "x", schema).with_window(1, 1);
        assert!(!single.build().contains("Window:"));

        let split = Stage1PromptBuilder::new(ChunkType::Credits, "t", "x", schema).with_window(2, 3);
        assert!(split.build().contains("Window: part 2 of 3"));
    }

    #[test]
    fn test_stage2_prompt_lists_only_batch_value_types() {
        let registry = SchemaRegistry::builtin().unwrap();
        let schema = registry.stage2(ChunkType::NegativeCovenants).unwrap();
        let b = block(
            "Total Leverage Ratio",
            "financial_covenant",
            "shall not permit the Total Leverage Ratio to exceed 3.50:1.00",
        );
        let prompt = Stage2PromptBuilder::new(schema, vec![&b]).build();

        assert!(prompt.contains("ValueType: financial_covenant"));
        assert!(prompt.contains("FieldName: thresholdValues"));
        assert!(prompt.contains("CollectMultiple: true"));
        assert!(!prompt.contains("FieldName: generalBasket"));
        assert!(prompt.contains("BlockId: Total Leverage Ratio"));
        assert!(prompt.contains("Allowed confidence values: high, medium, low"));
    }

    #[test]
    fn test_stage2_prompt_flags_summarized_fields() {
        let registry = SchemaRegistry::builtin().unwrap();
        let schema = registry.stage2(ChunkType::Definitions).unwrap();
        let b = block("Base Rate", "rate", "\"Base Rate\" means the Prime Rate.");
        let prompt = Stage2PromptBuilder::new(schema, vec![&b]).build();
        assert!(prompt.contains("OutputMode: summarized"));
    }

    #[test]
    fn test_response_schemas() {
        let registry = SchemaRegistry::builtin().unwrap();
        let s1 = stage1_response_schema(registry.stage1(ChunkType::Definitions).unwrap());
        let enums = s1["properties"]["blocks"]["items"]["properties"]["valueType"]["enum"]
            .as_array()
            .unwrap();
        assert!(enums.iter().any(|v| v == "term"));

        let s2 = stage2_response_schema(registry.stage2(ChunkType::Credits).unwrap());
        assert_eq!(s2["required"][0], "values");
        assert_eq!(
            s2["properties"]["values"]["items"]["properties"]["confidence"]["enum"][0],
            "high"
        );
    }
}
