//! Extract command implementation.

use crate::cli::{ExtractArgs, ThroughArg};
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use creditseer_domain::{DocumentId, InferenceService};
use creditseer_pdf::{DocumentTextExtractor, PdfTextExtractor};
use creditseer_pipeline::Pipeline;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

type CliPipeline = Pipeline<dyn InferenceService, DocumentTextExtractor>;

/// Execute the extract command.
pub async fn execute_extract(args: ExtractArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    info!("Extracting {} through {:?}", args.file.display(), args.through);
    let registry = config.registry(args.schemas.as_deref())?;
    debug!("Loaded {} schema(s)", registry.len());
    let pipeline = Pipeline::new(
        Arc::new(registry),
        config.inference_service()?,
        Arc::new(DocumentTextExtractor::new(PdfTextExtractor::new(config.pdf.clone()))),
        config.extractor.clone(),
    )?;

    let id = load(&pipeline, &args.file, formatter).await?;
    run_through(&pipeline, id, args.through, formatter).await?;

    println!("{}", formatter.format_run(&pipeline.snapshot(id)?)?);
    Ok(())
}

/// Start a run: PDFs go through text extraction, anything else is read as UTF-8 text.
async fn load(pipeline: &CliPipeline, file: &Path, formatter: &Formatter) -> Result<DocumentId> {
    let bytes = std::fs::read(file)?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    if is_pdf_path(file) {
        let id = pipeline.upload(&filename, bytes)?;
        let report = pipeline.process_document(id).await?;
        status(
            formatter,
            &format!(
                "Extracted {} pages from {} ({})",
                report.output.page_count, filename, report.output.method
            ),
        );
        Ok(id)
    } else {
        let text = String::from_utf8(bytes)
            .map_err(|_| CliError::InvalidInput(format!("{} is not UTF-8 text", filename)))?;
        debug!("Reading {} as plain text", filename);
        Ok(pipeline.ingest_text(&filename, &text)?)
    }
}

async fn run_through(
    pipeline: &CliPipeline,
    id: DocumentId,
    through: ThroughArg,
    formatter: &Formatter,
) -> Result<()> {
    if through >= ThroughArg::Chunks {
        let report = pipeline.chunk_document(id).await?;
        status(formatter, &format!("Split into {} chunk(s)", report.output.len()));
    }
    if through >= ThroughArg::Stage1 {
        let report = pipeline.run_stage1(id).await?;
        status(
            formatter,
            &format!(
                "Stage 1: {} block(s), {} anomalies in {} ms",
                report.output.block_count(),
                report.anomalies.len(),
                report.processing_time_ms
            ),
        );
    }
    if through >= ThroughArg::Stage2 {
        let report = pipeline.run_stage2(id).await?;
        status(
            formatter,
            &format!(
                "Stage 2: {} value(s), {} anomalies in {} ms",
                report.output.value_count(),
                report.anomalies.len(),
                report.processing_time_ms
            ),
        );
    }
    Ok(())
}

fn is_pdf_path(file: &Path) -> bool {
    file.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Progress goes to stderr so JSON on stdout stays parseable.
fn status(formatter: &Formatter, message: &str) {
    eprintln!("{}", formatter.success(message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputFormat, ProviderKind};
    use creditseer_domain::PipelineStage;
    use tempfile::TempDir;

    #[test]
    fn test_pdf_detection_by_extension() {
        assert!(is_pdf_path(Path::new("agreement.PDF")));
        assert!(!is_pdf_path(Path::new("agreement.txt")));
        assert!(!is_pdf_path(Path::new("agreement")));
    }

    #[tokio::test]
    async fn test_text_file_runs_through_chunks_with_mock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agreement.txt");
        std::fs::write(&path, "CREDIT AGREEMENT\n\nARTICLE I\nDEFINITIONS\n\n\"Lender\" means a bank.\n").unwrap();

        let mut config = Config::default();
        config.inference.provider = ProviderKind::Mock;
        let formatter = Formatter::new(OutputFormat::Json, false);
        let pipeline: CliPipeline = Pipeline::new(
            Arc::new(config.registry(None).unwrap()),
            config.inference_service().unwrap(),
            Arc::new(DocumentTextExtractor::default()),
            config.extractor.clone(),
        )
        .unwrap();

        let id = load(&pipeline, &path, &formatter).await.unwrap();
        assert_eq!(pipeline.state(id).unwrap(), PipelineStage::TextExtracted);

        run_through(&pipeline, id, ThroughArg::Stage2, &formatter).await.unwrap();
        let run = pipeline.snapshot(id).unwrap();
        assert_eq!(run.stage(), PipelineStage::Stage2Complete);
        assert_eq!(run.chunks.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_utf8_text_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agreement.txt");
        std::fs::write(&path, [0xff, 0xfe, 0xfd]).unwrap();

        let config = Config::default();
        let service: Arc<dyn InferenceService> = Arc::new(creditseer_llm::MockProvider::default());
        let pipeline: CliPipeline = Pipeline::new(
            Arc::new(config.registry(None).unwrap()),
            service,
            Arc::new(DocumentTextExtractor::default()),
            config.extractor.clone(),
        )
        .unwrap();
        let formatter = Formatter::new(OutputFormat::Table, false);

        let err = load(&pipeline, &path, &formatter).await.unwrap_err();
        assert!(matches!(err, CliError::InvalidInput(_)));
    }
}
