//! Document text normalization and per-invoice segmentation.
//!
//! A single PDF often carries several invoices back to back. The segmenter
//! cuts normalized text at lexical boundary phrases ("TAX INVOICE", "GSTIN",
//! "Bill To", ...) and folds header-only fragments back into the preceding
//! section. When that yields a single section, it retries on bare "Invoice"
//! tokens and drops pieces too short to be an invoice.

pub mod patterns;

use std::fmt;
use std::ops::Deref;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::models::config::SegmentationConfig;

use patterns::{BLANK_RUNS, BOUNDARY_PATTERN, INVOICE_TOKEN, LINE_BREAKS};

/// Default token threshold below which a section is merged into its predecessor.
pub const DEFAULT_MIN_SECTION_TOKENS: usize = 5;

/// Default token count a fallback piece must exceed to be kept.
pub const DEFAULT_FALLBACK_MIN_TOKENS: usize = 10;

/// Normalize line endings and collapse runs of blank lines.
pub fn normalize_text(raw: &str) -> String {
    let unix = LINE_BREAKS.replace_all(raw, "\n");
    BLANK_RUNS.replace_all(&unix, "\n\n").into_owned()
}

/// Number of whitespace-delimited tokens in `text`.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Normalized document text, produced once per input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DocumentText(String);

impl DocumentText {
    /// Normalize raw extracted text.
    pub fn new(raw: &str) -> Self {
        Self(normalize_text(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the text has no visible characters.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Deref for DocumentText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DocumentText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One presumed invoice cut from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// 1-based position in the document.
    pub section_id: u32,
    /// Trimmed section text.
    pub text: String,
}

impl Section {
    pub fn new(section_id: u32, text: impl Into<String>) -> Self {
        Self {
            section_id,
            text: text.into(),
        }
    }

    pub fn token_count(&self) -> usize {
        token_count(&self.text)
    }
}

/// Splits document text into per-invoice sections using lexical cues.
#[derive(Debug, Clone)]
pub struct BoundarySegmenter {
    boundaries: Regex,
    min_section_tokens: usize,
    fallback_min_tokens: usize,
}

impl BoundarySegmenter {
    /// Create a segmenter with the built-in phrase list and thresholds.
    pub fn new() -> Self {
        Self {
            boundaries: BOUNDARY_PATTERN.clone(),
            min_section_tokens: DEFAULT_MIN_SECTION_TOKENS,
            fallback_min_tokens: DEFAULT_FALLBACK_MIN_TOKENS,
        }
    }

    /// Create a segmenter from configuration.
    pub fn with_config(config: &SegmentationConfig) -> std::result::Result<Self, ConfigError> {
        let boundaries = compile_boundaries(&config.boundary_patterns)?;
        Ok(Self {
            boundaries,
            min_section_tokens: config.min_section_tokens,
            fallback_min_tokens: config.fallback_min_tokens,
        })
    }

    /// Set the merge threshold for degenerate sections.
    pub fn with_min_section_tokens(mut self, tokens: usize) -> Self {
        self.min_section_tokens = tokens;
        self
    }

    /// Set the minimum size of fallback pieces.
    pub fn with_fallback_min_tokens(mut self, tokens: usize) -> Self {
        self.fallback_min_tokens = tokens;
        self
    }

    /// Byte offsets where a boundary phrase starts, sorted and deduplicated.
    pub fn find_boundaries(&self, text: &str) -> Vec<usize> {
        let mut offsets: Vec<usize> = self.boundaries.find_iter(text).map(|m| m.start()).collect();
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }

    /// Cut at boundary phrases and merge degenerate fragments.
    ///
    /// Returns the whole trimmed text as the only element when no boundary
    /// phrase is present.
    pub fn split_by_boundaries(&self, text: &str) -> Vec<String> {
        let offsets = self.find_boundaries(text);
        if offsets.is_empty() {
            return vec![text.trim().to_string()];
        }

        trace!("Found {} boundary offsets", offsets.len());
        let pieces = cut_at(text, &offsets);
        merge_degenerate(pieces, self.min_section_tokens)
    }

    /// Split text into numbered sections.
    pub fn split(&self, text: &str) -> Vec<Section> {
        let mut pieces = self.split_by_boundaries(text);

        if pieces.len() == 1 {
            if let Some(fallback) = self.split_on_invoice_tokens(text) {
                debug!("Fallback split produced {} sections", fallback.len());
                pieces = fallback;
            }
        }

        debug!("Segmented {} characters into {} sections", text.len(), pieces.len());

        pieces
            .into_iter()
            .enumerate()
            .map(|(i, text)| Section::new(i as u32 + 1, text))
            .collect()
    }

    /// Re-split on bare "Invoice" tokens, keeping only substantial pieces.
    ///
    /// Short genuine invoices are dropped along with stray fragments.
    fn split_on_invoice_tokens(&self, text: &str) -> Option<Vec<String>> {
        let offsets: Vec<usize> = INVOICE_TOKEN.find_iter(text).map(|m| m.start()).collect();
        if offsets.len() < 2 {
            return None;
        }

        let pieces: Vec<String> = cut_at(text, &offsets)
            .into_iter()
            .filter(|piece| token_count(piece) > self.fallback_min_tokens)
            .collect();

        if pieces.is_empty() {
            debug!("Fallback split left no usable sections, keeping whole document");
            return None;
        }

        Some(pieces)
    }
}

impl Default for BoundarySegmenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Split text with the default segmenter.
pub fn split_sections(text: &str) -> Vec<Section> {
    BoundarySegmenter::new().split(text)
}

fn compile_boundaries(patterns: &[String]) -> std::result::Result<Regex, ConfigError> {
    if patterns.is_empty() {
        return Err(ConfigError::Invalid {
            key: "segmentation.boundary_patterns".to_string(),
            reason: "at least one pattern is required".to_string(),
        });
    }

    for pattern in patterns {
        Regex::new(pattern).map_err(|e| ConfigError::Pattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
    }

    let joined = patterns.join("|");
    RegexBuilder::new(&joined)
        .case_insensitive(true)
        .build()
        .map_err(|e| ConfigError::Pattern {
            pattern: joined.clone(),
            reason: e.to_string(),
        })
}

/// Cut `text` at each offset; offsets at or before the cursor are skipped.
fn cut_at(text: &str, offsets: &[usize]) -> Vec<String> {
    let mut pieces = Vec::with_capacity(offsets.len() + 1);
    let mut cursor = 0;

    for &offset in offsets.iter().chain(std::iter::once(&text.len())) {
        if offset <= cursor {
            continue;
        }
        let piece = text[cursor..offset].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        cursor = offset;
    }

    pieces
}

fn merge_degenerate(pieces: Vec<String>, min_tokens: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(pieces.len());

    for piece in pieces {
        match merged.last_mut() {
            Some(previous) if token_count(&piece) < min_tokens => {
                previous.push_str("\n\n");
                previous.push_str(&piece);
            }
            _ => merged.push(piece),
        }
    }

    merged
}
