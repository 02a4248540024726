//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::segment::patterns::DEFAULT_BOUNDARY_PATTERNS;
use crate::segment::{DEFAULT_FALLBACK_MIN_TOKENS, DEFAULT_MIN_SECTION_TOKENS};

/// Main configuration for the invex pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// Model endpoint configuration.
    pub llm: LlmConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// Document segmentation configuration.
    pub segmentation: SegmentationConfig,

    /// Extraction pipeline configuration.
    pub extraction: ExtractionConfig,

    /// Dataset output configuration.
    pub dataset: DatasetConfig,
}

/// Language model endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat-completions URL of the local text model server.
    pub text_url: String,

    /// Chat-completions URL of the vision model server.
    pub vision_url: String,

    /// OpenRouter chat-completions URL, used when `api_key` is set.
    pub openrouter_url: String,

    /// OpenRouter API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for text prompts.
    pub text_model: String,

    /// Model used for image prompts.
    pub vision_model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum tokens generated per response.
    pub max_tokens: u32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Retries on transient endpoint failures.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt.
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let local = "http://localhost:1234/v1/chat/completions".to_string();
        Self {
            text_url: local.clone(),
            vision_url: local,
            openrouter_url: "https://api.openrouter.ai/v1/chat/completions".to_string(),
            api_key: None,
            text_model: "qwen/qwen3-vl-4b".to_string(),
            vision_model: "qwen/qwen3-vl-4b".to_string(),
            temperature: 0.0,
            max_tokens: 2000,
            timeout_secs: 300,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl LlmConfig {
    /// URL and bearer token for text prompts.
    pub fn text_endpoint(&self) -> (&str, Option<&str>) {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => (&self.openrouter_url, Some(key)),
            _ => (&self.text_url, None),
        }
    }

    /// URL for image prompts.
    pub fn vision_endpoint(&self) -> &str {
        &self.vision_url
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Minimum text length to consider a PDF text-based.
    pub min_text_length: usize,

    /// Maximum page images sent to the vision model for scanned PDFs.
    pub max_images: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_text_length: 30,
            max_images: 8,
        }
    }
}

/// Boundary segmentation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Regex patterns that mark the start of an invoice (matched case-insensitively).
    pub boundary_patterns: Vec<String>,

    /// Sections with fewer tokens are merged into the previous section.
    pub min_section_tokens: usize,

    /// Fallback pieces must have more tokens than this to be kept.
    pub fallback_min_tokens: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            boundary_patterns: DEFAULT_BOUNDARY_PATTERNS.iter().map(|p| p.to_string()).collect(),
            min_section_tokens: DEFAULT_MIN_SECTION_TOKENS,
            fallback_min_tokens: DEFAULT_FALLBACK_MIN_TOKENS,
        }
    }
}

/// Extraction pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Try the truncated-output repair when the default repair fails.
    pub strict_recovery: bool,

    /// Concurrent model calls during section extraction.
    pub jobs: usize,

    /// Characters of section text kept in run reports.
    pub snippet_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strict_recovery: false,
            jobs: 4,
            snippet_chars: 300,
        }
    }
}

/// Dataset output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Directory for JSONL datasets, run reports and annotation files.
    pub output_dir: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("/tmp/invoice_extractor"),
        }
    }
}

impl DatasetConfig {
    /// Directory holding annotation exports and corrected gold records.
    pub fn gold_dir(&self) -> PathBuf {
        self.output_dir.join("gold")
    }
}

impl InvexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Overlay settings from process environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Overlay settings from a variable lookup.
    ///
    /// Recognized keys: `OPENROUTER_API_KEY`, `OPENROUTER_URL`, `LMSTUDIO_URL`,
    /// `LMSTUDIO_VISION_URL`, `TEXT_MODEL`, `VISION_MODEL` (falling back to
    /// `LMSTUDIO_MODEL`) and `TMP_DIR`. Empty values are ignored.
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENROUTER_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get("OPENROUTER_URL") {
            self.llm.openrouter_url = url;
        }
        if let Some(url) = get("LMSTUDIO_URL") {
            self.llm.text_url = url.clone();
            if get("LMSTUDIO_VISION_URL").is_none() {
                self.llm.vision_url = url;
            }
        }
        if let Some(url) = get("LMSTUDIO_VISION_URL") {
            self.llm.vision_url = url;
        }
        if let Some(model) = get("TEXT_MODEL") {
            self.llm.text_model = model;
        }
        if let Some(model) = get("VISION_MODEL").or_else(|| get("LMSTUDIO_MODEL")) {
            self.llm.vision_model = model;
        }
        if let Some(dir) = get("TMP_DIR") {
            self.dataset.output_dir = PathBuf::from(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = InvexConfig::default();
        assert_eq!(config.segmentation.min_section_tokens, 5);
        assert_eq!(config.segmentation.fallback_min_tokens, 10);
        assert_eq!(config.segmentation.boundary_patterns.len(), DEFAULT_BOUNDARY_PATTERNS.len());
        assert_eq!(config.llm.max_tokens, 2000);
        assert!(!config.extraction.strict_recovery);
        assert_eq!(config.llm.text_endpoint().1, None);
    }

    #[test]
    fn test_api_key_routes_to_openrouter() {
        let mut config = InvexConfig::default();
        config.apply_vars(lookup(&[("OPENROUTER_API_KEY", "sk-test")]));

        let (url, key) = config.llm.text_endpoint();
        assert_eq!(url, "https://api.openrouter.ai/v1/chat/completions");
        assert_eq!(key, Some("sk-test"));
        assert_eq!(config.llm.vision_endpoint(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn test_env_overlay() {
        let mut config = InvexConfig::default();
        config.apply_vars(lookup(&[
            ("LMSTUDIO_URL", "http://gpu:1234/v1/chat/completions"),
            ("LMSTUDIO_MODEL", "vision-x"),
            ("TEXT_MODEL", ""),
            ("TMP_DIR", "/var/tmp/invex"),
        ]));

        assert_eq!(config.llm.text_url, "http://gpu:1234/v1/chat/completions");
        assert_eq!(config.llm.vision_url, "http://gpu:1234/v1/chat/completions");
        assert_eq!(config.llm.vision_model, "vision-x");
        assert_eq!(config.llm.text_model, "qwen/qwen3-vl-4b");
        assert_eq!(config.dataset.output_dir, PathBuf::from("/var/tmp/invex"));
        assert_eq!(config.dataset.gold_dir(), PathBuf::from("/var/tmp/invex/gold"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: InvexConfig =
            serde_json::from_str(r#"{"extraction": {"jobs": 8}}"#).unwrap();
        assert_eq!(config.extraction.jobs, 8);
        assert_eq!(config.extraction.snippet_chars, 300);
        assert_eq!(config.pdf.min_text_length, 30);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = InvexConfig::default();
        config.llm.text_model = "local-model".to_string();
        config.save(&path).unwrap();

        let loaded = InvexConfig::from_file(&path).unwrap();
        assert_eq!(loaded.llm.text_model, "local-model");
    }
}
