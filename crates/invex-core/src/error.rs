//! Error types for the invex-core library.

use thiserror::Error;

use crate::repair::RepairStage;

/// Main error type for the invex library.
#[derive(Error, Debug)]
pub enum InvexError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Model output could not be turned into a JSON object.
    #[error("repair error: {0}")]
    Repair(#[from] RepairError),

    /// Invoice extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Model endpoint error.
    #[error("model error: {0}")]
    Llm(#[from] LlmError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors raised while repairing a model response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepairError {
    /// The model returned nothing to repair.
    #[error("model returned empty response")]
    Empty,

    /// Every repair stage failed.
    #[error("could not parse model output after {stage} stage: {reason} (cleaned text starts with {snippet:?})")]
    Unparseable {
        /// Last stage attempted.
        stage: RepairStage,
        /// Leading characters of the cleaned text.
        snippet: String,
        /// Parser message from the last attempt.
        reason: String,
    },
}

/// Errors related to invoice field extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Failed to parse a value.
    #[error("failed to parse {field}: {value}")]
    Parse { field: String, value: String },

    /// Field has the wrong JSON type.
    #[error("unexpected type for {field}: expected {expected}")]
    Type { field: String, expected: String },

    /// No invoice content could be obtained from the input.
    #[error("no invoice data found: {0}")]
    NoData(String),
}

/// Errors from the language model endpoint.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport-level failure (connection, timeout, TLS).
    #[error("request failed: {0}")]
    Transport(String),

    /// Endpoint answered with a non-success status.
    #[error("endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response carried no message content.
    #[error("model returned empty content. Full response:\n{0}")]
    EmptyContent(String),

    /// Response body was not the expected JSON envelope.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// All retry attempts were exhausted.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl LlmError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Transport(_) => true,
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A boundary pattern failed to compile.
    #[error("invalid boundary pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    /// A numeric setting is out of range.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;
