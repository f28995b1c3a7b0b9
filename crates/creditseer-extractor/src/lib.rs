//! CreditSeer Extractor
//!
//! Splits credit agreement text into typed chunks and runs the two
//! model-driven extraction stages over them.
//!
//! # Overview
//!
//! Stage 1 asks the model to copy the schema's blocks out of a chunk,
//! verbatim. Stage 2 asks it to fill structured fields from those blocks.
//! The model is never trusted: every block must be an exact span of the
//! chunk and every value must be traceable to its block. Output that fails
//! these checks is kept as an [`Anomaly`](creditseer_domain::Anomaly) rather
//! than dropped.
//!
//! # Architecture
//!
//! ```text
//! Text → Chunker → Chunks → Stage1Extractor → Blocks → Stage2Extractor → Values
//!                                  ↑                          ↑
//!                             Stage1Schema               Stage2Schema
//! ```
//!
//! # Key Features
//!
//! - **Chunking**: article headings with table-of-contents suppression
//! - **Grounding**: whitespace-tolerant verbatim location of block text
//! - **Windowing**: oversized chunks are sent in paragraph-aligned windows
//! - **Batching**: Stage 2 sends a bounded number of blocks per request
//! - **Confidence**: local assessment caps the model's reported confidence
//!
//! # Example Usage
//!
//! ```no_run
//! use creditseer_extractor::{Chunker, ExtractorConfig, Stage1Extractor};
//! use creditseer_llm::MockProvider;
//! use creditseer_schema::SchemaRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SchemaRegistry::builtin()?;
//! let llm = Arc::new(MockProvider::new(r#"{"blocks": []}"#));
//! let extractor = Stage1Extractor::new(llm, ExtractorConfig::default());
//!
//! for chunk in Chunker::new().chunk("ARTICLE I\nDEFINITIONS\n\n\"Borrower\" means Acme.") {
//!     let schema = registry.stage1(chunk.chunk_type)?;
//!     let result = extractor.extract(&chunk, schema).await?;
//!     println!("{}: {} block(s)", chunk.title, result.blocks.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod chunking;
pub mod confidence;
pub mod grounding;
pub mod parser;
pub mod prompt;

mod config;
mod error;
mod inference;
mod stage1;
mod stage2;

#[cfg(test)]
mod tests;

pub use chunking::{classify, page_at, Chunker, PageIndex};
pub use config::ExtractorConfig;
pub use error::ExtractorError;
pub use inference::complete_with_retry;
pub use stage1::{split_windows, Stage1ChunkResult, Stage1Extractor};
pub use stage2::{MissingField, Stage2ChunkResult, Stage2Extractor};
