//! Core library for invoice extraction.
//!
//! This crate provides:
//! - Document text normalization and per-invoice segmentation
//! - Repair of malformed JSON returned by language models
//! - Input routing (PDF text, scanned PDF images, image files, text files)
//! - An OpenAI-compatible model client and the extraction pipeline
//! - Dataset and annotation sinks for per-section extraction runs

pub mod dataset;
pub mod error;
pub mod input;
pub mod llm;
pub mod models;
pub mod pdf;
pub mod repair;
pub mod segment;

#[cfg(feature = "native")]
pub mod extract;

pub use error::{InvexError, Result};
pub use models::config::InvexConfig;
pub use models::record::{complete_record, InvoiceRecord, LineItem};
pub use pdf::{PdfExtractor, PdfProcessor};
pub use repair::{repair_model_output, repair_truncated, ModelOutputRepairer, RepairStage, Repaired};
pub use segment::{normalize_text, BoundarySegmenter, DocumentText, Section};
pub use input::{InputKind, LoadedDocument};
pub use llm::{EncodedImage, ModelClient, ModelRequest};

#[cfg(feature = "native")]
pub use llm::ChatClient;

#[cfg(feature = "native")]
pub use extract::{Extraction, Extractor, Route};
