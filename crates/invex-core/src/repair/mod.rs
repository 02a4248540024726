//! Recovery of JSON objects from language model responses.
//!
//! Models asked for "ONLY JSON" still wrap answers in Markdown fences, add
//! prose, use single quotes, leave trailing commas or stop mid-object. The
//! repairer escalates through increasingly aggressive cleanups and stops at
//! the first one that parses into a JSON object. It only promises valid JSON;
//! checking the record shape is [`crate::models::record::InvoiceRecord::from_map`]'s job.

pub mod cleanup;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::RepairError;

pub use cleanup::{
    close_unbalanced, extract_braced, fill_empty_values, normalize_quotes, quote_bare_keys,
    remove_trailing_commas, strip_code_fences,
};

/// Default number of cleaned-text characters quoted in parse failures.
pub const DEFAULT_SNIPPET_CHARS: usize = 200;

/// Repair stage that produced (or last failed to produce) a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStage {
    /// The trimmed response parsed as-is.
    Direct,
    /// Parsed after removing a byte-order mark.
    Trimmed,
    /// Parsed after fence stripping, brace extraction, quote and comma fixes
    /// and delimiter closing.
    Cleanup,
    /// Parsed after a second quote and trailing-comma pass over the cleanup.
    SecondPass,
    /// Parsed by the truncated-output recovery.
    Strict,
}

impl fmt::Display for RepairStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepairStage::Direct => "direct",
            RepairStage::Trimmed => "trimmed",
            RepairStage::Cleanup => "cleanup",
            RepairStage::SecondPass => "second-pass",
            RepairStage::Strict => "strict",
        };
        f.write_str(name)
    }
}

/// A recovered JSON object and the stage that recovered it.
#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub value: Map<String, Value>,
    pub stage: RepairStage,
}

/// Escalating repairer for model responses.
#[derive(Debug, Clone)]
pub struct ModelOutputRepairer {
    snippet_chars: usize,
}

impl ModelOutputRepairer {
    pub fn new() -> Self {
        Self {
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }

    /// Set how much cleaned text is quoted in parse failures.
    pub fn with_snippet_chars(mut self, chars: usize) -> Self {
        self.snippet_chars = chars;
        self
    }

    /// Run the default escalation.
    pub fn repair(&self, raw: Option<&str>) -> Result<Repaired, RepairError> {
        let trimmed = require_content(raw)?;

        if let Ok(value) = parse_object(trimmed) {
            return Ok(Repaired::new(value, RepairStage::Direct));
        }

        let unmarked = trimmed.trim_start_matches('\u{feff}').trim();
        if unmarked.starts_with('{') && unmarked.ends_with('}') {
            if let Ok(value) = parse_object(unmarked) {
                return Ok(Repaired::new(value, RepairStage::Trimmed));
            }
        }

        let cleaned = clean_structure(unmarked);
        match parse_object(&cleaned) {
            Ok(value) => return Ok(Repaired::new(value, RepairStage::Cleanup)),
            Err(reason) => trace!("Cleanup stage failed: {}", reason),
        }

        let second = remove_trailing_commas(&normalize_quotes(&cleaned));
        match parse_object(&second) {
            Ok(value) => Ok(Repaired::new(value, RepairStage::SecondPass)),
            Err(reason) => {
                debug!("Model output could not be repaired: {}", reason);
                Err(self.unparseable(RepairStage::SecondPass, &second, reason))
            }
        }
    }

    /// Recovery for heavily truncated output.
    ///
    /// On top of the structural cleanup this quotes bare keys and fills keys
    /// left without a value. It is never part of [`Self::repair`] because bare
    /// key quoting can misfire inside string values.
    pub fn repair_truncated(&self, raw: Option<&str>) -> Result<Repaired, RepairError> {
        let trimmed = require_content(raw)?;

        let unfenced = strip_code_fences(trimmed.trim_start_matches('\u{feff}'));
        let quoted = normalize_quotes(extract_braced(unfenced.trim()));
        let keyed = quote_bare_keys(&quoted);
        let closed = close_unbalanced(&remove_trailing_commas(&keyed));
        let finished = remove_trailing_commas(&fill_empty_values(&closed));

        parse_object(&finished)
            .map(|value| Repaired::new(value, RepairStage::Strict))
            .map_err(|reason| self.unparseable(RepairStage::Strict, &finished, reason))
    }

    fn unparseable(&self, stage: RepairStage, cleaned: &str, reason: String) -> RepairError {
        RepairError::Unparseable {
            stage,
            snippet: cleaned.chars().take(self.snippet_chars).collect(),
            reason,
        }
    }
}

impl Default for ModelOutputRepairer {
    fn default() -> Self {
        Self::new()
    }
}

impl Repaired {
    fn new(value: Map<String, Value>, stage: RepairStage) -> Self {
        if stage != RepairStage::Direct {
            debug!("Recovered model output at {} stage", stage);
        }
        Self { value, stage }
    }
}

/// Repair a model response into a JSON object.
pub fn repair_model_output(raw: Option<&str>) -> Result<Map<String, Value>, RepairError> {
    ModelOutputRepairer::new().repair(raw).map(|r| r.value)
}

/// Repair a truncated model response into a JSON object.
pub fn repair_truncated(raw: Option<&str>) -> Result<Map<String, Value>, RepairError> {
    ModelOutputRepairer::new().repair_truncated(raw).map(|r| r.value)
}

fn require_content(raw: Option<&str>) -> Result<&str, RepairError> {
    match raw.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(RepairError::Empty),
    }
}

fn clean_structure(text: &str) -> String {
    let unfenced = strip_code_fences(text);
    let quoted = normalize_quotes(extract_braced(unfenced.trim()));
    close_unbalanced(&remove_trailing_commas(&quoted))
}

fn parse_object(text: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, found {}", kind(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
