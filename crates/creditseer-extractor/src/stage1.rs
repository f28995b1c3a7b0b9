//! Stage 1: verbatim block isolation

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::grounding::locate_verbatim;
use crate::inference::complete_with_retry;
use crate::parser::{parse_stage1_response, RawBlock};
use crate::prompt::{stage1_response_schema, Stage1PromptBuilder, NOT_FOUND, SYSTEM_PROMPT};
use creditseer_domain::{
    Anomaly, AnomalyKind, Block, BlockRef, Chunk, CompletionRequest, ExtractionStage,
    InferenceService, Span,
};
use creditseer_schema::Stage1Schema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of Stage 1 for one chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage1ChunkResult {
    /// Accepted blocks in document order
    pub blocks: Vec<Block>,
    /// Rejected model output
    pub anomalies: Vec<Anomaly>,
    /// Block ids the model reported as absent
    pub not_found: Vec<String>,
}

/// Isolates schema blocks in a chunk and verifies each one against the chunk text
pub struct Stage1Extractor<I: ?Sized> {
    service: Arc<I>,
    config: ExtractorConfig,
}

impl<I> Stage1Extractor<I>
where
    I: InferenceService + ?Sized,
{
    /// Create a new Stage 1 extractor
    pub fn new(service: Arc<I>, config: ExtractorConfig) -> Self {
        Self { service, config }
    }

    /// Extract the blocks of `chunk` described by `schema`
    ///
    /// # Errors
    ///
    /// Fails only when the schema belongs to another chunk type or the
    /// inference service fails after every retry. Model output that does not
    /// hold up against the chunk text becomes an anomaly in the result.
    pub async fn extract(
        &self,
        chunk: &Chunk,
        schema: &Stage1Schema,
    ) -> Result<Stage1ChunkResult, ExtractorError> {
        if schema.chunk_type != chunk.chunk_type {
            return Err(ExtractorError::SchemaMismatch {
                chunk: chunk.chunk_type,
                schema: schema.chunk_type,
            });
        }
        if chunk.is_blank() {
            debug!("Chunk {} is blank, skipping Stage 1", chunk.index);
            return Ok(Stage1ChunkResult::default());
        }

        let windows = split_windows(&chunk.text, self.config.max_chunk_chars);
        info!(
            "Stage 1 on chunk {} ({}, {} chars, {} window(s)) with schema {}",
            chunk.index,
            chunk.chunk_type,
            chunk.char_count(),
            windows.len(),
            schema.schema_id
        );

        let mut collector = BlockCollector::new(chunk, schema);
        for (i, window) in windows.iter().enumerate() {
            let prompt = Stage1PromptBuilder::new(
                chunk.chunk_type,
                &chunk.title,
                &chunk.text[window.clone()],
                schema,
            )
            .with_window(i + 1, windows.len())
            .build();
            let request = CompletionRequest {
                system: SYSTEM_PROMPT.to_string(),
                prompt,
                response_schema: stage1_response_schema(schema),
                temperature: self.config.temperature,
            };

            let response = complete_with_retry(self.service.as_ref(), &request, &self.config).await?;
            match parse_stage1_response(&response) {
                Ok(parsed) => {
                    for skipped in parsed.skipped {
                        collector.anomalies.push(Anomaly::new(
                            ExtractionStage::Stage1,
                            chunk.index,
                            AnomalyKind::MalformedResponse,
                            format!("Unreadable block {} in response: {}", skipped.index, skipped.reason),
                            skipped.raw,
                        ));
                    }
                    parsed.items.into_iter().for_each(|raw| collector.accept(raw));
                }
                Err(e) => {
                    warn!("Malformed Stage 1 response for chunk {}: {}", chunk.index, e);
                    collector.anomalies.push(Anomaly::new(
                        ExtractionStage::Stage1,
                        chunk.index,
                        AnomalyKind::MalformedResponse,
                        e.to_string(),
                        response,
                    ));
                }
            }
        }

        let result = collector.finish();
        info!(
            "Stage 1 on chunk {}: {} block(s), {} anomal(ies), {} not found",
            chunk.index,
            result.blocks.len(),
            result.anomalies.len(),
            result.not_found.len()
        );
        Ok(result)
    }
}

/// Verifies raw blocks against the chunk and keeps the ones that hold up
struct BlockCollector<'a> {
    chunk: &'a Chunk,
    schema: &'a Stage1Schema,
    accepted: Vec<(String, String, Span)>,
    seen: HashSet<(String, Span)>,
    anomalies: Vec<Anomaly>,
    not_found: Vec<String>,
}

impl<'a> BlockCollector<'a> {
    fn new(chunk: &'a Chunk, schema: &'a Stage1Schema) -> Self {
        Self {
            chunk,
            schema,
            accepted: Vec::new(),
            seen: HashSet::new(),
            anomalies: Vec::new(),
            not_found: Vec::new(),
        }
    }

    fn anomaly(&mut self, kind: AnomalyKind, detail: String, raw: &RawBlock) {
        debug!("Rejected Stage 1 block '{}' in chunk {}: {}", raw.block_id, self.chunk.index, detail);
        self.anomalies.push(Anomaly::new(
            ExtractionStage::Stage1,
            self.chunk.index,
            kind,
            detail,
            raw.text.clone(),
        ));
    }

    fn accept(&mut self, raw: RawBlock) {
        let text = raw.text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case(NOT_FOUND) {
            if !self.not_found.contains(&raw.block_id) {
                self.not_found.push(raw.block_id);
            }
            return;
        }

        if !self.schema.declares_value_type(&raw.value_type) {
            let detail = format!(
                "valueType '{}' is not declared by schema {}",
                raw.value_type, self.schema.schema_id
            );
            self.anomaly(AnomalyKind::UnknownValueType, detail, &raw);
            return;
        }

        if self.schema.block(&raw.block_id).is_none() {
            debug!(
                "blockId '{}' is not in schema {}, keeping it as a label",
                raw.block_id, self.schema.schema_id
            );
        }

        let Some(range) = locate_verbatim(&self.chunk.text, text) else {
            let detail = format!("text of block '{}' does not occur in the chunk", raw.block_id);
            self.anomaly(AnomalyKind::UngroundedBlock, detail, &raw);
            return;
        };

        let span = Span::from(range);
        if !self.seen.insert((raw.value_type.clone(), span)) {
            return;
        }
        self.accepted.push((raw.block_id, raw.value_type, span));
    }

    fn finish(mut self) -> Stage1ChunkResult {
        self.accepted
            .sort_by_key(|(_, _, span)| (span.start, span.end));
        let chunk = self.chunk;
        let blocks = self
            .accepted
            .into_iter()
            .enumerate()
            .map(|(block_index, (block_id, value_type, span))| Block {
                block_ref: BlockRef {
                    chunk_index: chunk.index,
                    block_index,
                },
                block_id,
                value_type,
                text: chunk.text[span.as_range()].to_string(),
                span,
            })
            .collect();
        Stage1ChunkResult {
            blocks,
            anomalies: self.anomalies,
            not_found: self.not_found,
        }
    }
}

/// Split `text` into ranges of at most `max_len` bytes, preferring paragraph breaks
pub fn split_windows(text: &str, max_len: usize) -> Vec<Range<usize>> {
    let max_len = max_len.max(1);
    let mut ranges = Vec::new();
    let mut start = 0;

    while text.len() - start > max_len {
        let mut limit = start + max_len;
        while !text.is_char_boundary(limit) {
            limit -= 1;
        }
        if limit == start {
            // A single character wider than the window
            limit = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }
        let slice = &text[start..limit];
        let cut = slice
            .rfind("\n\n")
            .map(|i| start + i + 2)
            .or_else(|| slice.rfind('\n').map(|i| start + i + 1))
            .filter(|cut| *cut > start)
            .unwrap_or(limit);
        ranges.push(start..cut);
        start = cut;
    }
    ranges.push(start..text.len());
    ranges
}
