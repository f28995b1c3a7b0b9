//! CreditSeer Text Extraction
//!
//! Implementations of the `TextExtractor` trait from `creditseer-domain`.
//!
//! - [`PdfTextExtractor`]: pdf-extract page by page, then lopdf as a fallback,
//!   on a blocking thread under a timeout
//! - [`PlainTextExtractor`]: UTF-8 text files
//! - [`DocumentTextExtractor`]: picks one of the two by sniffing the bytes
//!
//! Every extractor returns normalized text; PDF text carries one
//! `--- Page N ---` marker line before each page.

#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
mod plain;

pub use config::PdfConfig;
pub use error::PdfError;
pub use extractor::PdfTextExtractor;
pub use plain::{DocumentTextExtractor, PlainTextExtractor};
