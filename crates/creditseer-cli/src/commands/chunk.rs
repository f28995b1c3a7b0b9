//! Chunk command implementation.

use crate::cli::ChunkArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use creditseer_domain::TextExtractor;
use creditseer_extractor::Chunker;
use creditseer_pdf::{DocumentTextExtractor, PdfTextExtractor};
use tracing::info;

/// Execute the chunk command.
pub async fn execute_chunk(args: ChunkArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let bytes = std::fs::read(&args.file)?;
    let extractor = DocumentTextExtractor::new(PdfTextExtractor::new(config.pdf.clone()));
    let extracted = extractor.extract_text(&bytes).await?;

    let chunks = Chunker::new().chunk(&extracted.text);
    info!("Chunked {} into {} chunk(s)", args.file.display(), chunks.len());
    if !formatter.is_json() {
        println!(
            "{}",
            formatter.info(&format!(
                "{}: {} chars, {} chunk(s)",
                args.file.display(),
                extracted.text.chars().count(),
                chunks.len()
            ))
        );
    }
    println!("{}", formatter.format_chunks(&chunks)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_chunk_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agreement.txt");
        std::fs::write(&path, "ARTICLE I\nDEFINITIONS\n\nARTICLE II\nTHE CREDITS\n").unwrap();

        let formatter = Formatter::new(OutputFormat::Json, false);
        let args = ChunkArgs { file: path };
        assert!(execute_chunk(args, &Config::default(), &formatter).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let args = ChunkArgs {
            file: PathBuf::from("/nonexistent/agreement.txt"),
        };
        let err = execute_chunk(args, &Config::default(), &formatter).await.unwrap_err();
        assert!(matches!(err, crate::error::CliError::Io(_)));
    }
}
