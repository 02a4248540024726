//! WASM bindings for invoice segmentation and model output repair.
//!
//! Everything here runs without network access: model calls stay on the
//! JavaScript side, which hands raw responses back for repair.

use std::fmt::Display;

use serde::Serialize;
use serde_json::{Map, Value};
use serde_wasm_bindgen::Serializer;
use wasm_bindgen::prelude::*;

use invex_core::models::config::SegmentationConfig;
use invex_core::models::record::parse_amount;
use invex_core::{BoundarySegmenter, DocumentText, InvoiceRecord};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn js_error(e: impl Display) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}

/// Serialize maps as plain objects rather than `Map`s.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value.serialize(&Serializer::json_compatible()).map_err(js_error)
}

fn record_from_js(record: JsValue) -> Result<Map<String, Value>, JsValue> {
    match serde_wasm_bindgen::from_value::<Value>(record).map_err(js_error)? {
        Value::Object(map) => Ok(map),
        _ => Err(js_error("expected an invoice record object")),
    }
}

/// Normalize line endings and collapse blank-line runs.
#[wasm_bindgen]
pub fn normalize_text(text: &str) -> String {
    invex_core::normalize_text(text)
}

/// Split document text into `{section_id, text}` sections.
#[wasm_bindgen]
pub fn split_sections(text: &str) -> Result<JsValue, JsValue> {
    to_js(&invex_core::segment::split_sections(&DocumentText::new(text)))
}

/// Repair a raw model response into a record object.
///
/// Throws when the response is empty or cannot be repaired.
#[wasm_bindgen]
pub fn repair_model_output(raw: Option<String>) -> Result<JsValue, JsValue> {
    let value = invex_core::repair_model_output(raw.as_deref()).map_err(js_error)?;
    to_js(&value)
}

/// Repair a truncated model response, quoting bare keys and filling
/// missing values.
#[wasm_bindgen]
pub fn repair_truncated(raw: Option<String>) -> Result<JsValue, JsValue> {
    let value = invex_core::repair_truncated(raw.as_deref()).map_err(js_error)?;
    to_js(&value)
}

/// Fill the keys a record must carry.
#[wasm_bindgen]
pub fn complete_record(record: JsValue, source_text: &str) -> Result<JsValue, JsValue> {
    let record = record_from_js(record)?;
    to_js(&invex_core::complete_record(record, source_text))
}

/// List consistency issues of a record. Throws on malformed fields.
#[wasm_bindgen]
pub fn validate_record(record: JsValue) -> Result<JsValue, JsValue> {
    let record = record_from_js(record)?;
    let invoice = InvoiceRecord::from_map(&record).map_err(js_error)?;
    to_js(&invoice.validate())
}

/// Parse an amount like "₹1,234.50" or "1.234,50".
#[wasm_bindgen]
pub fn parse_invoice_amount(amount: &str) -> Option<f64> {
    parse_amount(amount)
        .ok()
        .flatten()
        .and_then(|d| d.to_string().parse().ok())
}

/// Configurable boundary segmenter for browser use.
#[wasm_bindgen]
pub struct Segmenter {
    inner: BoundarySegmenter,
}

#[wasm_bindgen]
impl Segmenter {
    /// Create a segmenter from an optional segmentation config object.
    ///
    /// Missing fields take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Segmenter, JsValue> {
        let config: SegmentationConfig = if config.is_undefined() || config.is_null() {
            SegmentationConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(js_error)?
        };

        let inner = BoundarySegmenter::with_config(&config).map_err(js_error)?;
        Ok(Self { inner })
    }

    /// Split text into sections.
    #[wasm_bindgen]
    pub fn split(&self, text: &str) -> Result<JsValue, JsValue> {
        to_js(&self.inner.split(&DocumentText::new(text)))
    }

    /// Byte offsets of boundary phrases in normalized text.
    #[wasm_bindgen]
    pub fn find_boundaries(&self, text: &str) -> Vec<u32> {
        self.inner
            .find_boundaries(&DocumentText::new(text))
            .into_iter()
            .map(|offset| offset as u32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("a\r\nb\n\n\n\nc"), "a\nb\n\nc");
    }

    #[wasm_bindgen_test]
    fn test_parse_invoice_amount() {
        let amount = parse_invoice_amount("₹1,234.50").unwrap();
        assert!((amount - 1234.5).abs() < 0.001);
        assert!(parse_invoice_amount("n/a").is_none());
    }

    #[wasm_bindgen_test]
    fn test_repair_rejects_empty() {
        assert!(repair_model_output(None).is_err());
        assert!(repair_model_output(Some("  ".to_string())).is_err());
    }

    #[wasm_bindgen_test]
    fn test_repair_returns_object() {
        let value = repair_model_output(Some("```json\n{\"total\": 5,}\n```".to_string())).unwrap();
        assert!(value.is_object());
    }

    #[wasm_bindgen_test]
    fn test_segmenter_defaults() {
        let segmenter = Segmenter::new(JsValue::UNDEFINED).unwrap();
        let offsets = segmenter.find_boundaries("TAX INVOICE one\r\nTAX INVOICE two");
        assert_eq!(offsets, vec![0, 16]);
    }
}
