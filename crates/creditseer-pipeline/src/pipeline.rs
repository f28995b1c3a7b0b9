//! Stage boundary operations

use crate::error::PipelineError;
use crate::state::{BusyGuard, PipelineRun, PipelineState, SourceFile};
use crate::types::{ChunkBlocks, ChunkValues, Stage1Output, Stage2Output, StageReport};
use creditseer_domain::{
    normalize_text, Anomaly, Chunk, Document, DocumentId, ExtractionMethod, InferenceService,
    PipelineStage, TextExtractor,
};
use creditseer_extractor::{Chunker, ExtractorConfig, Stage1Extractor, Stage2Extractor};
use creditseer_schema::SchemaRegistry;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Drives documents through text extraction, chunking and both extraction stages
///
/// Every stage runs only on request and only once its prerequisite output
/// exists. A stage works on a copy of its inputs and commits in one step,
/// so a failed stage leaves the run untouched.
pub struct Pipeline<I: ?Sized, T: ?Sized> {
    state: Arc<PipelineState>,
    registry: Arc<SchemaRegistry>,
    text_extractor: Arc<T>,
    chunker: Chunker,
    stage1: Stage1Extractor<I>,
    stage2: Stage2Extractor<I>,
    model_name: String,
}

impl<I, T> Pipeline<I, T>
where
    I: InferenceService + ?Sized,
    T: TextExtractor + ?Sized,
{
    /// Create a pipeline with an empty state arena
    ///
    /// # Errors
    ///
    /// `Configuration` when the registry lacks a Stage 1 schema for some
    /// chunk type or `config` is invalid.
    pub fn new(
        registry: Arc<SchemaRegistry>,
        inference: Arc<I>,
        text_extractor: Arc<T>,
        config: ExtractorConfig,
    ) -> Result<Self, PipelineError> {
        registry.validate_complete()?;
        config.validate().map_err(PipelineError::Configuration)?;

        Ok(Self {
            state: Arc::new(PipelineState::new()),
            registry,
            text_extractor,
            chunker: Chunker::new(),
            stage1: Stage1Extractor::new(inference.clone(), config.clone()),
            stage2: Stage2Extractor::new(inference.clone(), config),
            model_name: inference.model_name().to_string(),
        })
    }

    /// Share an existing state arena
    pub fn with_state(mut self, state: Arc<PipelineState>) -> Self {
        self.state = state;
        self
    }

    /// The state arena
    pub fn state_handle(&self) -> Arc<PipelineState> {
        self.state.clone()
    }

    /// The schema registry
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Start a run from uploaded bytes
    ///
    /// # Errors
    ///
    /// `Input` when `bytes` is empty.
    pub fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<DocumentId, PipelineError> {
        let id = DocumentId::new();
        self.replace(id, filename, bytes)?;
        Ok(id)
    }

    /// Replace the run of `id` with a new upload
    ///
    /// # Errors
    ///
    /// `Input` when `bytes` is empty, `Busy` when a stage is in flight.
    pub fn replace(&self, id: DocumentId, filename: &str, bytes: Vec<u8>) -> Result<(), PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::Input(format!("{} is empty", filename)));
        }
        info!("Uploaded {} ({} bytes) as {}", filename, bytes.len(), id);
        self.state
            .insert(PipelineRun::new(id, SourceFile::new(filename, bytes)))
    }

    /// Start a run from already-extracted text, at `TextExtracted`
    ///
    /// # Errors
    ///
    /// `Input` when the text is blank.
    pub fn ingest_text(&self, filename: &str, text: &str) -> Result<DocumentId, PipelineError> {
        let normalized = normalize_text(text);
        if normalized.trim().is_empty() {
            return Err(PipelineError::Input(format!("{} contains no text", filename)));
        }

        let id = DocumentId::new();
        let mut run = PipelineRun::new(id, SourceFile::new(filename, text.as_bytes()));
        run.commit_document(Document {
            id,
            filename: filename.to_string(),
            text: normalized,
            method: ExtractionMethod::PlainText,
            page_count: 0,
            table_count: 0,
        });
        self.state.insert(run)?;
        info!("Ingested text of {} as {}", filename, id);
        Ok(id)
    }

    /// Extract and normalize the text of the uploaded source
    ///
    /// # Errors
    ///
    /// `Input` when the source is unreadable or has no text, `Service` when
    /// the text extractor fails.
    pub async fn process_document(&self, id: DocumentId) -> Result<StageReport<Document>, PipelineError> {
        let (guard, started) = self.begin(id, PipelineStage::TextExtracted)?;
        let source = guard.read(|run| run.source.clone())?;

        let extracted = self.text_extractor.extract_text(&source.bytes).await?;
        let text = normalize_text(&extracted.text);
        if text.trim().is_empty() {
            return Err(PipelineError::Input(format!("{} contains no text", source.filename)));
        }

        let document = Document {
            id,
            filename: source.filename.clone(),
            text,
            method: extracted.method,
            page_count: extracted.page_count,
            table_count: extracted.table_count,
        };
        info!(
            "Extracted {} chars from {} ({}, {} pages)",
            document.char_count(),
            document.filename,
            document.method,
            document.page_count
        );

        let committed = document.clone();
        let stage = guard.commit(move |run| run.commit_document(committed))?;
        Ok(self.report(id, stage, document, Vec::new(), None, started))
    }

    /// Split the document text into typed chunks
    ///
    /// # Errors
    ///
    /// `Sequence` before text extraction.
    pub async fn chunk_document(&self, id: DocumentId) -> Result<StageReport<Vec<Chunk>>, PipelineError> {
        let (guard, started) = self.begin(id, PipelineStage::Chunked)?;
        let text = guard.read(|run| run.document.as_ref().map(|d| d.text.clone()))?;
        let text = text.ok_or_else(|| self.sequence_error(&guard, PipelineStage::Chunked))?;

        let chunks = self.chunker.chunk(&text);
        info!("Document {} split into {} chunk(s)", id, chunks.len());

        let committed = chunks.clone();
        let stage = guard.commit(move |run| run.commit_chunks(committed))?;
        Ok(self.report(id, stage, chunks, Vec::new(), None, started))
    }

    /// Run Stage 1 over every chunk
    ///
    /// # Errors
    ///
    /// `Sequence` before chunking, `Configuration` when a chunk type has no
    /// Stage 1 schema, `Service` when inference fails after every retry.
    pub async fn run_stage1(&self, id: DocumentId) -> Result<StageReport<Stage1Output>, PipelineError> {
        let (guard, started) = self.begin(id, PipelineStage::Stage1Complete)?;
        let chunks = guard.read(|run| run.chunks.clone())?;
        let chunks = chunks.ok_or_else(|| self.sequence_error(&guard, PipelineStage::Stage1Complete))?;

        let mut output = Stage1Output::default();
        for chunk in &chunks {
            let schema = self.registry.stage1(chunk.chunk_type)?;
            let result = self.stage1.extract(chunk, schema).await.map_err(|e| {
                warn!("Stage 1 aborted on chunk {} of {}: {}", chunk.index, id, e);
                PipelineError::from(e)
            })?;
            output.anomalies.extend(result.anomalies);
            output.chunks.push(ChunkBlocks {
                chunk_index: chunk.index,
                chunk_type: chunk.chunk_type,
                schema_id: schema.schema_id.clone(),
                blocks: result.blocks,
                not_found: result.not_found,
            });
        }
        info!(
            "Stage 1 complete for {}: {} block(s), {} anomal(ies)",
            id,
            output.block_count(),
            output.anomalies.len()
        );

        let anomalies = output.anomalies.clone();
        let committed = output.clone();
        let stage = guard.commit(move |run| run.commit_stage1(committed))?;
        Ok(self.report(id, stage, output, anomalies, Some(self.model_name.clone()), started))
    }

    /// Run Stage 2 over the Stage 1 blocks
    ///
    /// Chunk types without a Stage 2 schema are skipped; the run still
    /// reaches `Stage2Complete`.
    ///
    /// # Errors
    ///
    /// `Sequence` before Stage 1, `Service` when inference fails after every
    /// retry.
    pub async fn run_stage2(&self, id: DocumentId) -> Result<StageReport<Stage2Output>, PipelineError> {
        let (guard, started) = self.begin(id, PipelineStage::Stage2Complete)?;
        let stage1 = guard.read(|run| run.stage1.clone())?;
        let stage1 = stage1.ok_or_else(|| self.sequence_error(&guard, PipelineStage::Stage2Complete))?;

        let mut output = Stage2Output::default();
        for chunk in &stage1.chunks {
            let Some(schema) = self.registry.stage2(chunk.chunk_type) else {
                info!(
                    "Chunk {} ({}) has no Stage 2 schema, skipping",
                    chunk.chunk_index, chunk.chunk_type
                );
                output.chunks.push(ChunkValues {
                    chunk_index: chunk.chunk_index,
                    chunk_type: chunk.chunk_type,
                    schema_id: None,
                    values: Vec::new(),
                    missing: Vec::new(),
                });
                continue;
            };

            let result = self.stage2.extract(&chunk.blocks, schema).await.map_err(|e| {
                warn!("Stage 2 aborted on chunk {} of {}: {}", chunk.chunk_index, id, e);
                PipelineError::from(e)
            })?;
            output.anomalies.extend(result.anomalies);
            output.chunks.push(ChunkValues {
                chunk_index: chunk.chunk_index,
                chunk_type: chunk.chunk_type,
                schema_id: Some(schema.schema_id.clone()),
                values: result.values,
                missing: result.missing,
            });
        }
        info!(
            "Stage 2 complete for {}: {} value(s), {} anomal(ies)",
            id,
            output.value_count(),
            output.anomalies.len()
        );

        let anomalies = output.anomalies.clone();
        let committed = output.clone();
        let stage = guard.commit(move |run| run.commit_stage2(committed))?;
        Ok(self.report(id, stage, output, anomalies, Some(self.model_name.clone()), started))
    }

    /// A copy of the run
    pub fn snapshot(&self, id: DocumentId) -> Result<PipelineRun, PipelineError> {
        self.state.snapshot(id)
    }

    /// Current state of the run
    pub fn state(&self, id: DocumentId) -> Result<PipelineStage, PipelineError> {
        self.state.state(id)
    }

    /// Drop the run
    pub fn remove(&self, id: DocumentId) -> Result<PipelineRun, PipelineError> {
        self.state.remove(id)
    }

    /// Ids of every run, oldest first
    pub fn document_ids(&self) -> Result<Vec<DocumentId>, PipelineError> {
        self.state.document_ids()
    }

    /// Claim the document and check the stage's prerequisite
    fn begin(&self, id: DocumentId, requested: PipelineStage) -> Result<(BusyGuard, Instant), PipelineError> {
        let guard = self.state.begin(id)?;
        guard.read(|run| run.require(requested))??;
        info!("Running {} on {}", requested, id);
        Ok((guard, Instant::now()))
    }

    fn sequence_error(&self, guard: &BusyGuard, requested: PipelineStage) -> PipelineError {
        match guard.read(PipelineRun::stage) {
            Ok(current) => PipelineError::Sequence { requested, current },
            Err(e) => e,
        }
    }

    fn report<O>(
        &self,
        id: DocumentId,
        stage: PipelineStage,
        output: O,
        anomalies: Vec<Anomaly>,
        model_name: Option<String>,
        started: Instant,
    ) -> StageReport<O> {
        StageReport {
            document_id: id,
            stage,
            output,
            anomalies,
            model_name,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            processing_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creditseer_llm::MockProvider;
    use creditseer_pdf::PlainTextExtractor;

    fn pipeline() -> Pipeline<MockProvider, PlainTextExtractor> {
        Pipeline::new(
            Arc::new(SchemaRegistry::builtin().unwrap()),
            Arc::new(MockProvider::new(r#"{"blocks": []}"#)),
            Arc::new(PlainTextExtractor),
            ExtractorConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_incomplete_registry_is_rejected() {
        let result = Pipeline::new(
            Arc::new(SchemaRegistry::new()),
            Arc::new(MockProvider::default()),
            Arc::new(PlainTextExtractor),
            ExtractorConfig::default(),
        );
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_empty_upload_is_rejected() {
        let pipeline = pipeline();
        assert!(matches!(
            pipeline.upload("empty.pdf", Vec::new()),
            Err(PipelineError::Input(_))
        ));
        assert!(matches!(
            pipeline.ingest_text("blank.txt", "  \n\t"),
            Err(PipelineError::Input(_))
        ));
        assert!(pipeline.document_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_document_extracts_text() {
        let pipeline = pipeline();
        let id = pipeline
            .upload("agreement.txt", b"CREDIT AGREEMENT\r\nARTICLE I\r\nDEFINITIONS\r\n".to_vec())
            .unwrap();
        assert_eq!(pipeline.state(id).unwrap(), PipelineStage::Uploaded);

        let report = pipeline.process_document(id).await.unwrap();
        assert_eq!(report.stage, PipelineStage::TextExtracted);
        assert_eq!(report.output.method, ExtractionMethod::PlainText);
        assert!(!report.output.text.contains('\r'));
        assert!(report.model_name.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_source_is_input_error() {
        let pipeline = pipeline();
        let id = pipeline.upload("binary.bin", vec![0xff, 0xfe, 0x00]).unwrap();

        let err = pipeline.process_document(id).await.unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
        assert_eq!(pipeline.state(id).unwrap(), PipelineStage::Uploaded);
        assert!(!pipeline.state_handle().is_busy(id).unwrap());
    }
}
