//! CreditSeer Pipeline
//!
//! User-gated execution of the extraction stages over in-memory document runs.
//!
//! # Overview
//!
//! Each uploaded document gets a [`PipelineRun`] in a shared
//! [`PipelineState`] arena. The run moves strictly forward:
//!
//! ```text
//! Uploaded → TextExtracted → Chunked → Stage1Complete → Stage2Complete
//! ```
//!
//! A stage runs only when asked and only when its prerequisite output
//! exists; it is never run implicitly. Re-running a stage replaces its
//! output and drops everything downstream. One stage at a time may run per
//! document; runs of different documents are independent.
//!
//! # Example Usage
//!
//! ```no_run
//! use creditseer_extractor::ExtractorConfig;
//! use creditseer_llm::MockProvider;
//! use creditseer_pdf::PlainTextExtractor;
//! use creditseer_pipeline::Pipeline;
//! use creditseer_schema::SchemaRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(
//!     Arc::new(SchemaRegistry::builtin()?),
//!     Arc::new(MockProvider::new(r#"{"blocks": []}"#)),
//!     Arc::new(PlainTextExtractor),
//!     ExtractorConfig::default(),
//! )?;
//!
//! let id = pipeline.upload("agreement.txt", std::fs::read("agreement.txt")?)?;
//! pipeline.process_document(id).await?;
//! pipeline.chunk_document(id).await?;
//! let report = pipeline.run_stage1(id).await?;
//! println!("{} block(s), {} anomalies", report.output.block_count(), report.anomalies.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod error;
mod pipeline;
pub mod state;
mod types;

pub use error::PipelineError;
pub use pipeline::Pipeline;
pub use state::{BusyGuard, PipelineRun, PipelineState, SourceFile};
pub use types::{ChunkBlocks, ChunkValues, Stage1Output, Stage2Output, StageReport};
