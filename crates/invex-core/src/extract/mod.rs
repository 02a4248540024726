//! Extraction pipeline: input routing, model call, repair and completion.

use std::path::Path;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, InvexError, RepairError, Result};
use crate::input::{load_document, split_with, LoadedDocument};
use crate::llm::{ModelClient, ModelRequest};
use crate::models::config::InvexConfig;
use crate::models::record::{complete_record, InvoiceRecord};
use crate::repair::{ModelOutputRepairer, RepairStage, Repaired};
use crate::segment::{BoundarySegmenter, Section};

/// Which model handled a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Text,
    Vision,
}

/// A completed record and how it was obtained.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: Map<String, Value>,
    pub route: Route,
    pub stage: RepairStage,
}

impl Extraction {
    /// Typed view of the record.
    pub fn invoice(&self) -> std::result::Result<InvoiceRecord, ExtractionError> {
        InvoiceRecord::from_map(&self.record)
    }
}

/// Result of one section in a batch: the record, or `{"error": message}`.
#[derive(Debug, Clone, Serialize)]
pub struct SectionExtraction {
    pub section_id: u32,
    pub text: String,
    pub output: Value,
}

impl SectionExtraction {
    pub fn is_error(&self) -> bool {
        self.output.get("error").is_some_and(Value::is_string)
    }
}

/// Runs documents through a model client.
pub struct Extractor<C> {
    client: C,
    config: InvexConfig,
    segmenter: BoundarySegmenter,
    repairer: ModelOutputRepairer,
}

impl<C: ModelClient> Extractor<C> {
    pub fn new(client: C, config: InvexConfig) -> Result<Self> {
        let segmenter = BoundarySegmenter::with_config(&config.segmentation)?;
        Ok(Self {
            client,
            config,
            segmenter,
            repairer: ModelOutputRepairer::new(),
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &InvexConfig {
        &self.config
    }

    /// Extract one invoice from raw text.
    pub async fn extract_text(&self, text: &str) -> Result<Extraction> {
        self.run(ModelRequest::invoice_text(text), Route::Text, text).await
    }

    /// Extract one invoice from a PDF, image or text file.
    pub async fn extract_file(&self, path: &Path) -> Result<Extraction> {
        match load_document(path, &self.config.pdf)? {
            LoadedDocument::Text(text) => {
                if text.is_blank() {
                    return Err(ExtractionError::NoData(format!("no text found in {}", path.display())).into());
                }
                self.run(ModelRequest::invoice_text(&text), Route::Text, &text).await
            }
            LoadedDocument::Images(images) => {
                info!("Sending {} page images from {} to the vision model", images.len(), path.display());
                self.run(ModelRequest::invoice_images(images), Route::Vision, "").await
            }
        }
    }

    /// Extract every section, at most `extraction.jobs` requests at a time.
    ///
    /// Output keeps section order. A failed section yields
    /// `{"error": message}` instead of aborting the batch.
    pub async fn extract_sections(&self, sections: &[Section]) -> Vec<SectionExtraction> {
        let jobs = self.config.extraction.jobs.max(1);
        debug!("Extracting {} sections with {} concurrent requests", sections.len(), jobs);

        stream::iter(sections.iter().map(|section| async move {
            let output = match self.extract_text(&section.text).await {
                Ok(extraction) => Value::Object(extraction.record),
                Err(e) => {
                    warn!("Section {} failed: {}", section.section_id, e);
                    error_record(&e)
                }
            };
            SectionExtraction {
                section_id: section.section_id,
                text: section.text.clone(),
                output,
            }
        }))
        .buffered(jobs)
        .collect()
        .await
    }

    /// Load a file and split its text into sections.
    pub fn split_file(&self, path: &Path) -> Result<Vec<Section>> {
        split_with(path, &self.config.pdf, &self.segmenter)
    }

    async fn run(&self, request: ModelRequest, route: Route, source_text: &str) -> Result<Extraction> {
        let raw = self.client.complete(&request).await?;
        let repaired = self.repair(&raw)?;

        Ok(Extraction {
            record: complete_record(repaired.value, source_text),
            route,
            stage: repaired.stage,
        })
    }

    fn repair(&self, raw: &str) -> std::result::Result<Repaired, RepairError> {
        match self.repairer.repair(Some(raw)) {
            Err(err @ RepairError::Unparseable { .. }) if self.config.extraction.strict_recovery => {
                self.repairer.repair_truncated(Some(raw)).map_err(|strict_err| {
                    debug!("Truncated-output repair also failed: {}", strict_err);
                    err
                })
            }
            other => other,
        }
    }
}

/// Placeholder record for a failed extraction.
pub fn error_record(err: &InvexError) -> Value {
    json!({ "error": err.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::Mutex;

    /// Answers each request with a fixed function of the request.
    struct FnClient<F> {
        respond: F,
        seen: Mutex<Vec<ModelRequest>>,
    }

    impl<F> FnClient<F>
    where
        F: Fn(&ModelRequest) -> std::result::Result<String, LlmError> + Send + Sync,
    {
        fn new(respond: F) -> Self {
            Self {
                respond,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl<F> ModelClient for FnClient<F>
    where
        F: Fn(&ModelRequest) -> std::result::Result<String, LlmError> + Send + Sync,
    {
        async fn complete(&self, request: &ModelRequest) -> std::result::Result<String, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            (self.respond)(request)
        }
    }

    fn fixed(answer: &'static str) -> FnClient<impl Fn(&ModelRequest) -> std::result::Result<String, LlmError> + Send + Sync> {
        FnClient::new(move |_: &ModelRequest| Ok(answer.to_string()))
    }

    fn prompt_of(request: &ModelRequest) -> &str {
        match request {
            ModelRequest::Text { prompt } => prompt,
            ModelRequest::Vision { .. } => "",
        }
    }

    #[tokio::test]
    async fn test_extract_text_completes_record() {
        let client = fixed("```json\n{\"invoice_number\": \"INV-7\", \"total\": 118.0,}\n```");
        let extractor = Extractor::new(client, InvexConfig::default()).unwrap();

        let extraction = extractor.extract_text("TAX INVOICE INV-7").await.unwrap();
        assert_eq!(extraction.route, Route::Text);
        assert_eq!(extraction.stage, RepairStage::Cleanup);
        assert_eq!(extraction.record["invoice_number"], "INV-7");
        assert_eq!(extraction.record["items"], json!([]));
        assert_eq!(extraction.record["raw_text"], "TAX INVOICE INV-7");
        assert_eq!(extraction.record["vendor_name"], Value::Null);
        assert_eq!(extraction.record.len(), 11);

        let seen = extractor.client().seen.lock().unwrap();
        assert!(prompt_of(&seen[0]).contains("TAX INVOICE INV-7"));
    }

    #[tokio::test]
    async fn test_model_raw_text_is_kept() {
        let client = fixed(r#"{"raw_text": "as seen by the model", "items": null}"#);
        let extractor = Extractor::new(client, InvexConfig::default()).unwrap();

        let extraction = extractor.extract_text("source").await.unwrap();
        assert_eq!(extraction.record["raw_text"], "as seen by the model");
        assert_eq!(extraction.record["items"], json!([]));
    }

    #[tokio::test]
    async fn test_unrepairable_output_is_error() {
        let extractor = Extractor::new(fixed("Sorry, I can't help with that."), InvexConfig::default()).unwrap();

        let err = extractor.extract_text("text").await.unwrap_err();
        assert!(matches!(err, InvexError::Repair(RepairError::Unparseable { .. })));
    }

    #[tokio::test]
    async fn test_strict_recovery_is_opt_in() {
        let truncated = "{invoice_number: \"INV-8\", total: 5, vendor_name:";

        let lenient = Extractor::new(fixed(truncated), InvexConfig::default()).unwrap();
        assert!(lenient.extract_text("text").await.is_err());

        let mut config = InvexConfig::default();
        config.extraction.strict_recovery = true;
        let strict = Extractor::new(fixed(truncated), config).unwrap();

        let extraction = strict.extract_text("text").await.unwrap();
        assert_eq!(extraction.stage, RepairStage::Strict);
        assert_eq!(extraction.record["invoice_number"], "INV-8");
        assert_eq!(extraction.record["vendor_name"], "");
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let client = FnClient::new(|_: &ModelRequest| {
            Err(LlmError::Status {
                status: 401,
                body: "unauthorized".to_string(),
            })
        });
        let extractor = Extractor::new(client, InvexConfig::default()).unwrap();

        let err = extractor.extract_text("text").await.unwrap_err();
        assert!(matches!(err, InvexError::Llm(LlmError::Status { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_extract_sections_substitutes_errors() {
        let client = FnClient::new(|request: &ModelRequest| {
            let prompt = prompt_of(request);
            if prompt.contains("BROKEN") {
                Err(LlmError::EmptyContent("{}".to_string()))
            } else if prompt.contains("INV-1") {
                Ok(r#"{"invoice_number": "INV-1"}"#.to_string())
            } else {
                Ok(r#"{"invoice_number": "INV-3"}"#.to_string())
            }
        });
        let extractor = Extractor::new(client, InvexConfig::default()).unwrap();

        let sections = vec![
            Section::new(1, "TAX INVOICE INV-1"),
            Section::new(2, "TAX INVOICE BROKEN"),
            Section::new(3, "TAX INVOICE INV-3"),
        ];
        let results = extractor.extract_sections(&sections).await;

        let ids: Vec<u32> = results.iter().map(|r| r.section_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(results[0].output["invoice_number"], "INV-1");
        assert_eq!(results[0].output["raw_text"], "TAX INVOICE INV-1");
        assert!(results[1].is_error());
        assert!(results[1].output["error"].as_str().unwrap().contains("empty content"));
        assert_eq!(results[2].output["invoice_number"], "INV-3");
        assert!(!results[2].is_error());
    }

    #[tokio::test]
    async fn test_extract_file_routes_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let text_path = dir.path().join("invoice.txt");
        fs::write(&text_path, "TAX INVOICE\r\nINV-5").unwrap();
        let image_path = dir.path().join("scan.png");
        image::RgbaImage::from_pixel(3, 3, image::Rgba([0, 0, 0, 255]))
            .save(&image_path)
            .unwrap();

        let extractor = Extractor::new(fixed(r#"{"invoice_number": "INV-5"}"#), InvexConfig::default()).unwrap();

        let from_text = extractor.extract_file(&text_path).await.unwrap();
        assert_eq!(from_text.route, Route::Text);
        assert_eq!(from_text.record["raw_text"], "TAX INVOICE\nINV-5");

        let from_image = extractor.extract_file(&image_path).await.unwrap();
        assert_eq!(from_image.route, Route::Vision);
        assert_eq!(from_image.record["raw_text"], "");

        let seen = extractor.client().seen.lock().unwrap();
        assert!(matches!(&seen[1], ModelRequest::Vision { images } if images.len() == 1));
    }

    #[tokio::test]
    async fn test_blank_text_file_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "  \n\n ").unwrap();

        let extractor = Extractor::new(fixed("{}"), InvexConfig::default()).unwrap();
        let err = extractor.extract_file(&path).await.unwrap_err();
        assert!(matches!(err, InvexError::Extraction(ExtractionError::NoData(_))));
        assert!(extractor.client().seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_split_file_uses_configured_segmenter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.txt");
        fs::write(&path, "RECEIPT one two three four five\nRECEIPT six seven eight nine ten").unwrap();

        let mut config = InvexConfig::default();
        config.segmentation.boundary_patterns = vec![r"\bRECEIPT\b".to_string()];
        let extractor = Extractor::new(fixed("{}"), config).unwrap();

        let sections = extractor.split_file(&path).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].text, "RECEIPT six seven eight nine ten");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut config = InvexConfig::default();
        config.segmentation.boundary_patterns = vec!["(unclosed".to_string()];
        assert!(matches!(
            Extractor::new(fixed("{}"), config),
            Err(InvexError::Config(_))
        ));
    }
}
