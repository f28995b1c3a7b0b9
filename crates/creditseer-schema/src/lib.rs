//! CreditSeer Schema Registry
//!
//! Loads and indexes the extraction schemas that drive Stage 1 and Stage 2,
//! keyed by `(ChunkType, ExtractionStage)`.
//!
//! # Overview
//!
//! Every chunk type must resolve to a Stage 1 schema: a chunk that cannot be
//! mapped to block definitions is a configuration error, not a silent skip.
//! Stage 2 schemas are optional; a chunk type without one resolves to
//! [`SchemaRef::NoStage2`] and is passed over by the Stage 2 extractor.
//!
//! # Example Usage
//!
//! ```
//! use creditseer_domain::{ChunkType, ExtractionStage};
//! use creditseer_schema::{SchemaRef, SchemaRegistry};
//!
//! let registry = SchemaRegistry::builtin().unwrap();
//!
//! match registry.resolve(ChunkType::Cover, ExtractionStage::Stage2).unwrap() {
//!     SchemaRef::NoStage2 => {}
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

#![warn(missing_docs)]

mod builtin;
mod error;
mod registry;
mod types;

pub use error::SchemaError;
pub use registry::{SchemaEntry, SchemaRef, SchemaRegistry};
pub use types::{
    BlockSpec, ExtractionHint, FieldSpec, HintType, Schema, Stage1Schema, Stage2Schema,
};
