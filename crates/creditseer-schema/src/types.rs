//! Schema document types
//!
//! Schema documents are JSON with camelCase keys. Every document names its
//! `schemaId`, `version`, `chunkType` and numeric `stage`; the stage decides
//! which of the two shapes below the rest of the document takes.

use crate::error::SchemaError;
use creditseer_domain::{ChunkType, Confidence, ExtractionStage, OutputMode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A Stage 1 block definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSpec {
    /// Identifier the model reports back (e.g. "Consolidated EBITDA")
    pub block_id: String,

    /// Human-readable description of what the block holds
    #[serde(default)]
    pub label: String,

    /// Value type tag attached to isolated blocks
    pub value_type: String,

    /// Heading or phrase the block usually starts near
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_pattern: Option<String>,
}

/// Stage 1 schema: the blocks to isolate verbatim from one chunk type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage1Schema {
    /// Schema identifier
    pub schema_id: String,
    /// Schema version
    pub version: String,
    /// Chunk type this schema applies to
    pub chunk_type: ChunkType,
    /// Free-form description shown to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Block definitions
    pub blocks: Vec<BlockSpec>,
}

impl Stage1Schema {
    /// Value types declared by the schema's blocks
    pub fn value_types(&self) -> BTreeSet<&str> {
        self.blocks.iter().map(|b| b.value_type.as_str()).collect()
    }

    /// Whether `value_type` is declared by any block
    pub fn declares_value_type(&self, value_type: &str) -> bool {
        self.blocks.iter().any(|b| b.value_type == value_type)
    }

    /// Look up a block definition by id
    pub fn block(&self, block_id: &str) -> Option<&BlockSpec> {
        self.blocks.iter().find(|b| b.block_id == block_id)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.blocks.is_empty() {
            return Err(self.invalid("stage 1 schema declares no blocks"));
        }
        let mut seen = HashSet::new();
        for block in &self.blocks {
            if block.block_id.trim().is_empty() {
                return Err(self.invalid("block with empty blockId"));
            }
            if block.value_type.trim().is_empty() {
                return Err(self.invalid(&format!("block '{}' has empty valueType", block.block_id)));
            }
            if !seen.insert(block.block_id.as_str()) {
                return Err(self.invalid(&format!("duplicate blockId '{}'", block.block_id)));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> SchemaError {
        SchemaError::Invalid {
            schema_id: self.schema_id.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Format expected of a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintType {
    /// Free text
    #[default]
    Text,
    /// A number, amount, percentage or ratio
    QuantitativeMetric,
    /// A calendar date or test date
    Date,
    /// A section or clause reference
    Location,
    /// A period of time ("30 days")
    Duration,
    /// Yes/no
    Boolean,
    /// Any type this version does not know; checked as text
    #[serde(other)]
    Other,
}

impl HintType {
    /// Get the hint type label as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            HintType::Text => "text",
            HintType::QuantitativeMetric => "quantitative_metric",
            HintType::Date => "date",
            HintType::Location => "location",
            HintType::Duration => "duration",
            HintType::Boolean => "boolean",
            HintType::Other => "other",
        }
    }
}

impl std::fmt::Display for HintType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guidance for extracting one field
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionHint {
    /// Expected value format
    #[serde(rename = "type", default)]
    pub hint_type: HintType,
    /// Example pattern shown to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Extra instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A structured field extracted from blocks of one value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    /// Field name
    pub name: String,
    /// Extraction guidance
    #[serde(default)]
    pub extraction_hint: ExtractionHint,
    /// Whether repeated values are collected into a list
    #[serde(default)]
    pub collect_multiple: bool,
    /// Verbatim copy or grounded summary
    #[serde(default)]
    pub output_mode: OutputMode,
}

/// Stage 2 schema: the structured fields to pull out of each value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage2Schema {
    /// Schema identifier
    pub schema_id: String,
    /// Schema version
    pub version: String,
    /// Chunk type this schema applies to
    pub chunk_type: ChunkType,
    /// Free-form description shown to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Confidence classes the model may report
    pub confidence_taxonomy: Vec<Confidence>,
    /// Field sets keyed by Stage 1 value type
    pub schemas_by_value_type: BTreeMap<String, Vec<FieldSpec>>,
}

impl Stage2Schema {
    /// Fields defined for a value type
    pub fn fields_for(&self, value_type: &str) -> Option<&[FieldSpec]> {
        self.schemas_by_value_type
            .get(value_type)
            .map(Vec::as_slice)
            .filter(|fields| !fields.is_empty())
    }

    /// Look up one field of a value type
    pub fn field(&self, value_type: &str, name: &str) -> Option<&FieldSpec> {
        self.fields_for(value_type)?.iter().find(|f| f.name == name)
    }

    /// Whether the taxonomy accepts `confidence`
    pub fn accepts(&self, confidence: Confidence) -> bool {
        self.confidence_taxonomy.contains(&confidence)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.confidence_taxonomy.is_empty() {
            return Err(self.invalid("confidenceTaxonomy is empty"));
        }
        if self.schemas_by_value_type.is_empty() {
            return Err(self.invalid("schemasByValueType is empty"));
        }
        for (value_type, fields) in &self.schemas_by_value_type {
            let mut seen = HashSet::new();
            for field in fields {
                if field.name.trim().is_empty() {
                    return Err(self.invalid(&format!("field with empty name under '{}'", value_type)));
                }
                if !seen.insert(field.name.as_str()) {
                    return Err(self.invalid(&format!(
                        "duplicate field '{}' under '{}'",
                        field.name, value_type
                    )));
                }
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> SchemaError {
        SchemaError::Invalid {
            schema_id: self.schema_id.clone(),
            reason: reason.to_string(),
        }
    }
}

/// A parsed schema document of either stage
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Block isolation schema
    Stage1(Stage1Schema),
    /// Value extraction schema
    Stage2(Stage2Schema),
}

#[derive(Deserialize)]
struct Envelope {
    stage: ExtractionStage,
}

impl Schema {
    /// Parse and structurally validate one schema document
    ///
    /// `origin` names the document in error messages.
    pub fn from_json(origin: &str, json: &str) -> Result<Self, SchemaError> {
        let parse_err = |e: serde_json::Error| SchemaError::Parse {
            origin: origin.to_string(),
            message: e.to_string(),
        };

        let value: serde_json::Value = serde_json::from_str(json).map_err(parse_err)?;
        let envelope: Envelope = serde_json::from_value(value.clone()).map_err(parse_err)?;

        let schema = match envelope.stage {
            ExtractionStage::Stage1 => {
                Schema::Stage1(serde_json::from_value(value).map_err(parse_err)?)
            }
            ExtractionStage::Stage2 => {
                Schema::Stage2(serde_json::from_value(value).map_err(parse_err)?)
            }
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Stage this document applies to
    pub fn stage(&self) -> ExtractionStage {
        match self {
            Schema::Stage1(_) => ExtractionStage::Stage1,
            Schema::Stage2(_) => ExtractionStage::Stage2,
        }
    }

    /// Chunk type this document applies to
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            Schema::Stage1(s) => s.chunk_type,
            Schema::Stage2(s) => s.chunk_type,
        }
    }

    /// Schema identifier
    pub fn schema_id(&self) -> &str {
        match self {
            Schema::Stage1(s) => &s.schema_id,
            Schema::Stage2(s) => &s.schema_id,
        }
    }

    /// Schema version
    pub fn version(&self) -> &str {
        match self {
            Schema::Stage1(s) => &s.version,
            Schema::Stage2(s) => &s.version,
        }
    }

    fn validate(&self) -> Result<(), SchemaError> {
        match self {
            Schema::Stage1(s) => s.validate(),
            Schema::Stage2(s) => s.validate(),
        }
    }
}
