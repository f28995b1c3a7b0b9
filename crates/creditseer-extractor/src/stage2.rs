//! Stage 2: structured values grounded in Stage 1 blocks

use crate::confidence::assess;
use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::grounding::value_grounded;
use crate::inference::complete_with_retry;
use crate::parser::{parse_stage2_response, RawValue};
use crate::prompt::{stage2_response_schema, Stage2PromptBuilder, NOT_FOUND, SYSTEM_PROMPT};
use creditseer_domain::{
    Anomaly, AnomalyKind, Block, BlockRef, CompletionRequest, Confidence, ExtractedValue,
    ExtractionStage, FieldValue, InferenceService,
};
use creditseer_schema::{FieldSpec, Stage2Schema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A schema field for which no value was accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingField {
    /// Block the field belongs to
    pub block_ref: BlockRef,
    /// Field name
    pub field: String,
}

/// Outcome of Stage 2 for one chunk's blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage2ChunkResult {
    /// Accepted values, by block then schema field order
    pub values: Vec<ExtractedValue>,
    /// Rejected model output
    pub anomalies: Vec<Anomaly>,
    /// Fields of eligible blocks that ended without a value
    pub missing: Vec<MissingField>,
}

/// Extracts schema fields from Stage 1 blocks and verifies them against the block text
pub struct Stage2Extractor<I: ?Sized> {
    service: Arc<I>,
    config: ExtractorConfig,
}

impl<I> Stage2Extractor<I>
where
    I: InferenceService + ?Sized,
{
    /// Create a new Stage 2 extractor
    pub fn new(service: Arc<I>, config: ExtractorConfig) -> Self {
        Self { service, config }
    }

    /// Extract values from one chunk's `blocks`
    ///
    /// Blocks whose value type has no fields in `schema` are skipped. The
    /// others are sent in batches of `max_blocks_per_request`.
    ///
    /// # Errors
    ///
    /// Fails only when the inference service fails after every retry.
    pub async fn extract(
        &self,
        blocks: &[Block],
        schema: &Stage2Schema,
    ) -> Result<Stage2ChunkResult, ExtractorError> {
        let eligible: Vec<&Block> = blocks
            .iter()
            .filter(|b| {
                let known = schema.fields_for(&b.value_type).is_some();
                if !known {
                    debug!("Block {} ({}) has no Stage 2 fields, skipping", b.block_ref, b.value_type);
                }
                known
            })
            .collect();
        let Some(first) = eligible.first() else {
            return Ok(Stage2ChunkResult::default());
        };
        let chunk_index = first.block_ref.chunk_index;

        let batch_size = self.config.max_blocks_per_request.max(1);
        info!(
            "Stage 2 on chunk {}: {} block(s) in {} batch(es) with schema {}",
            chunk_index,
            eligible.len(),
            eligible.len().div_ceil(batch_size),
            schema.schema_id
        );

        let mut collector = ValueCollector::new(schema, chunk_index);
        for batch in eligible.chunks(batch_size) {
            let request = CompletionRequest {
                system: SYSTEM_PROMPT.to_string(),
                prompt: Stage2PromptBuilder::new(schema, batch.to_vec()).build(),
                response_schema: stage2_response_schema(schema),
                temperature: self.config.temperature,
            };

            let response = complete_with_retry(self.service.as_ref(), &request, &self.config).await?;
            match parse_stage2_response(&response) {
                Ok(parsed) => {
                    for skipped in parsed.skipped {
                        collector.anomalies.push(Anomaly::new(
                            ExtractionStage::Stage2,
                            chunk_index,
                            AnomalyKind::MalformedResponse,
                            format!("Unreadable value {} in response: {}", skipped.index, skipped.reason),
                            skipped.raw,
                        ));
                    }
                    for raw in parsed.items {
                        collector.accept(batch, raw);
                    }
                }
                Err(e) => {
                    warn!("Malformed Stage 2 response for chunk {}: {}", chunk_index, e);
                    collector.anomalies.push(Anomaly::new(
                        ExtractionStage::Stage2,
                        chunk_index,
                        AnomalyKind::MalformedResponse,
                        e.to_string(),
                        response,
                    ));
                }
            }
        }

        let result = collector.finish(&eligible);
        info!(
            "Stage 2 on chunk {}: {} value(s), {} anomal(ies), {} missing field(s)",
            chunk_index,
            result.values.len(),
            result.anomalies.len(),
            result.missing.len()
        );
        Ok(result)
    }
}

#[derive(Debug, Default)]
struct Pending {
    items: Vec<String>,
    reported: Option<Confidence>,
}

struct ValueCollector<'a> {
    schema: &'a Stage2Schema,
    chunk_index: usize,
    pending: BTreeMap<(BlockRef, String), Pending>,
    anomalies: Vec<Anomaly>,
}

impl<'a> ValueCollector<'a> {
    fn new(schema: &'a Stage2Schema, chunk_index: usize) -> Self {
        Self {
            schema,
            chunk_index,
            pending: BTreeMap::new(),
            anomalies: Vec::new(),
        }
    }

    fn reject(&mut self, kind: AnomalyKind, block: Option<BlockRef>, detail: String, raw: &RawValue) {
        debug!("Rejected Stage 2 value for '{}': {}", raw.field, detail);
        let anomaly = Anomaly::new(
            ExtractionStage::Stage2,
            self.chunk_index,
            kind,
            detail,
            raw.value.clone(),
        );
        self.anomalies.push(match block {
            Some(block_ref) => anomaly.with_block(block_ref),
            None => anomaly,
        });
    }

    fn spec_for(&self, block: &Block, field: &str) -> Option<&'a FieldSpec> {
        self.schema.field(&block.value_type, field)
    }

    fn accept(&mut self, batch: &[&'a Block], raw: RawValue) {
        let value = raw.value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(NOT_FOUND) {
            return;
        }

        let Some(block) = self.resolve_block(batch, &raw) else {
            return;
        };

        let Some(spec) = self.spec_for(block, &raw.field) else {
            let detail = format!(
                "field '{}' is not defined for value type '{}'",
                raw.field, block.value_type
            );
            self.reject(AnomalyKind::UnknownField, Some(block.block_ref), detail, &raw);
            return;
        };

        if !value_grounded(value, spec.output_mode, &block.text) {
            let detail = format!("value of '{}' is not supported by block {}", raw.field, block.block_ref);
            self.reject(AnomalyKind::UngroundedValue, Some(block.block_ref), detail, &raw);
            return;
        }

        let reported = match raw.confidence.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(label) => match Confidence::parse(label).filter(|c| self.schema.accepts(*c)) {
                Some(confidence) => Some(confidence),
                None => {
                    let detail = format!(
                        "confidence '{}' for '{}' is outside the schema taxonomy",
                        label, raw.field
                    );
                    self.reject(AnomalyKind::InvalidConfidence, Some(block.block_ref), detail, &raw);
                    return;
                }
            },
        };

        let entry = self
            .pending
            .entry((block.block_ref, spec.name.clone()))
            .or_default();
        if !spec.collect_multiple && !entry.items.is_empty() {
            debug!("Keeping the first value of single field '{}' in {}", spec.name, block.block_ref);
            return;
        }
        if !entry.items.iter().any(|v| v == value) {
            entry.items.push(value.to_string());
        }
        entry.reported = match (entry.reported, reported) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    /// The block a value belongs to, by id when the id is usable, else by grounding
    fn resolve_block(&mut self, batch: &[&'a Block], raw: &RawValue) -> Option<&'a Block> {
        let named: Vec<&'a Block> = raw
            .block_id
            .as_deref()
            .map(|id| {
                batch
                    .iter()
                    .copied()
                    .filter(|b| b.block_id.trim().eq_ignore_ascii_case(id.trim()))
                    .collect()
            })
            .unwrap_or_default();
        if let [block] = named.as_slice() {
            return Some(block);
        }

        let pool: Vec<&'a Block> = if named.is_empty() { batch.to_vec() } else { named };
        let defining: Vec<&'a Block> = pool
            .iter()
            .copied()
            .filter(|b| self.spec_for(b, &raw.field).is_some())
            .collect();
        if defining.is_empty() {
            let detail = format!("field '{}' is not defined for any block in the request", raw.field);
            self.reject(AnomalyKind::UnknownField, None, detail, raw);
            return None;
        }

        let grounded: Vec<&'a Block> = defining
            .into_iter()
            .filter(|b| {
                self.spec_for(b, &raw.field)
                    .is_some_and(|spec| value_grounded(&raw.value, spec.output_mode, &b.text))
            })
            .collect();
        match grounded.as_slice() {
            [block] => {
                debug!(
                    "Attributed '{}' without a usable blockId to {}",
                    raw.field, block.block_ref
                );
                Some(block)
            }
            [] => {
                let detail = format!(
                    "value of '{}' names no known block and is grounded in none",
                    raw.field
                );
                self.reject(AnomalyKind::UngroundedValue, None, detail, raw);
                None
            }
            several => {
                let refs: Vec<String> = several.iter().map(|b| b.block_ref.to_string()).collect();
                let detail = format!(
                    "value of '{}' is grounded in several blocks: {}",
                    raw.field,
                    refs.join(", ")
                );
                self.reject(AnomalyKind::AmbiguousGrounding, None, detail, raw);
                None
            }
        }
    }

    fn finish(mut self, eligible: &[&Block]) -> Stage2ChunkResult {
        let mut values = Vec::new();
        let mut missing = Vec::new();

        for block in eligible {
            let Some(fields) = self.schema.fields_for(&block.value_type) else {
                continue;
            };
            for spec in fields {
                let Some(pending) = self.pending.remove(&(block.block_ref, spec.name.clone())) else {
                    missing.push(MissingField {
                        block_ref: block.block_ref,
                        field: spec.name.clone(),
                    });
                    continue;
                };

                let value = if spec.collect_multiple {
                    FieldValue::Multiple(pending.items)
                } else {
                    match pending.items.into_iter().next() {
                        Some(v) => FieldValue::Single(v),
                        None => continue,
                    }
                };
                let assessment = assess(Some(spec), &value, &block.text);
                let reported = pending.reported.unwrap_or(assessment.level);
                values.push(ExtractedValue {
                    block_ref: block.block_ref,
                    block_id: block.block_id.clone(),
                    value_type: block.value_type.clone(),
                    field: spec.name.clone(),
                    value,
                    output_mode: spec.output_mode,
                    confidence: reported.min(assessment.level),
                    reported_confidence: reported,
                    assessment,
                });
            }
        }

        Stage2ChunkResult {
            values,
            anomalies: self.anomalies,
            missing,
        }
    }
}
