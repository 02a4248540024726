//! Invoice record shape produced by the model and its typed view.
//!
//! The repaired model output stays a JSON object so nothing the model said is
//! lost. [`complete_record`] fills in the keys every record must carry, and
//! [`InvoiceRecord::from_map`] is the separate, explicit schema check.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ExtractionError;

/// Keys every completed record carries.
pub const RECORD_FIELDS: [&str; 11] = [
    "invoice_number",
    "date",
    "vendor_name",
    "buyer_name",
    "gst_number",
    "currency",
    "subtotal",
    "tax",
    "total",
    "items",
    "raw_text",
];

/// Keys every completed line item carries.
pub const ITEM_FIELDS: [&str; 4] = ["name", "quantity", "unit_price", "total_price"];

/// Default missing keys of a repaired record.
///
/// `items` becomes an empty array when missing or null, `raw_text` becomes
/// `source_text` when missing or null, and every other key becomes null.
/// Object items get their missing keys set to null. Present values are never
/// changed.
pub fn complete_record(mut record: Map<String, Value>, source_text: &str) -> Map<String, Value> {
    for field in RECORD_FIELDS {
        let missing = record.get(field).map_or(true, Value::is_null);
        if !missing {
            continue;
        }
        let default = match field {
            "items" => Value::Array(Vec::new()),
            "raw_text" => Value::String(source_text.to_string()),
            _ => Value::Null,
        };
        record.insert(field.to_string(), default);
    }

    if let Some(Value::Array(items)) = record.get_mut("items") {
        for item in items.iter_mut() {
            if let Value::Object(fields) = item {
                for key in ITEM_FIELDS {
                    fields.entry(key).or_insert(Value::Null);
                }
            }
        }
    }

    record
}

/// A single line item on the invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product/service description.
    pub name: Option<String>,

    /// Quantity.
    pub quantity: Option<Decimal>,

    /// Price per unit.
    pub unit_price: Option<Decimal>,

    /// Line total.
    pub total_price: Option<Decimal>,
}

/// Typed invoice record validated from a repaired model response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub invoice_number: Option<String>,

    /// Invoice date exactly as printed; formats vary too much to normalize.
    pub date: Option<String>,

    pub vendor_name: Option<String>,

    pub buyer_name: Option<String>,

    /// GST identification number of the vendor.
    pub gst_number: Option<String>,

    pub currency: Option<String>,

    /// Total before tax.
    pub subtotal: Option<Decimal>,

    pub tax: Option<Decimal>,

    pub total: Option<Decimal>,

    #[serde(default)]
    pub items: Vec<LineItem>,

    /// Text the record was extracted from.
    #[serde(default)]
    pub raw_text: String,
}

impl InvoiceRecord {
    /// Check field types and coerce amounts.
    ///
    /// Amounts may be JSON numbers or numeric strings such as `"Rs. 1,200.00"`.
    pub fn from_map(record: &Map<String, Value>) -> Result<Self, ExtractionError> {
        let items = match record.get("items") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| line_item(i, item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(ExtractionError::Type {
                    field: "items".to_string(),
                    expected: "array".to_string(),
                });
            }
        };

        Ok(Self {
            invoice_number: text_field(record, "invoice_number")?,
            date: text_field(record, "date")?,
            vendor_name: text_field(record, "vendor_name")?,
            buyer_name: text_field(record, "buyer_name")?,
            gst_number: text_field(record, "gst_number")?,
            currency: text_field(record, "currency")?,
            subtotal: amount_field(record, "subtotal", "subtotal")?,
            tax: amount_field(record, "tax", "tax")?,
            total: amount_field(record, "total", "total")?,
            items,
            raw_text: text_field(record, "raw_text")?.unwrap_or_default(),
        })
    }

    /// Validate the record and return any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let tolerance = Decimal::new(1, 2);

        if self.invoice_number.as_deref().map_or(true, str::is_empty) {
            issues.push("Missing invoice number".to_string());
        }

        if self.vendor_name.as_deref().map_or(true, str::is_empty) {
            issues.push("Missing vendor name".to_string());
        }

        if self.total.is_none() {
            issues.push("Missing total".to_string());
        }

        if self.items.is_empty() {
            issues.push("No line items".to_string());
        }

        for (i, item) in self.items.iter().enumerate() {
            if let (Some(qty), Some(price), Some(total)) =
                (item.quantity, item.unit_price, item.total_price)
            {
                if (qty * price - total).abs() > tolerance {
                    issues.push(format!(
                        "Item {} total ({}) differs from quantity x unit price ({})",
                        i + 1,
                        total,
                        qty * price
                    ));
                }
            }
        }

        let line_totals: Option<Decimal> = if self.items.is_empty() {
            None
        } else {
            self.items.iter().map(|i| i.total_price).sum()
        };

        if let (Some(lines), Some(subtotal)) = (line_totals, self.subtotal) {
            if (lines - subtotal).abs() > tolerance {
                issues.push(format!(
                    "Line item total ({}) differs from subtotal ({})",
                    lines, subtotal
                ));
            }
        }

        if let (Some(subtotal), Some(tax), Some(total)) = (self.subtotal, self.tax, self.total) {
            if (subtotal + tax - total).abs() > tolerance {
                issues.push(format!(
                    "Subtotal plus tax ({}) differs from total ({})",
                    subtotal + tax,
                    total
                ));
            }
        }

        issues
    }
}

fn line_item(index: usize, value: &Value) -> Result<LineItem, ExtractionError> {
    let fields = value.as_object().ok_or_else(|| ExtractionError::Type {
        field: format!("items[{}]", index),
        expected: "object".to_string(),
    })?;

    let label = |key: &str| format!("items[{}].{}", index, key);

    Ok(LineItem {
        name: text_field(fields, "name")?,
        quantity: amount_field(fields, "quantity", &label("quantity"))?,
        unit_price: amount_field(fields, "unit_price", &label("unit_price"))?,
        total_price: amount_field(fields, "total_price", &label("total_price"))?,
    })
}

fn text_field(record: &Map<String, Value>, key: &str) -> Result<Option<String>, ExtractionError> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(ExtractionError::Type {
            field: key.to_string(),
            expected: "string".to_string(),
        }),
    }
}

fn amount_field(
    record: &Map<String, Value>,
    key: &str,
    label: &str,
) -> Result<Option<Decimal>, ExtractionError> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let s = n.to_string();
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .map(Some)
                .map_err(|_| ExtractionError::Parse {
                    field: label.to_string(),
                    value: s,
                })
        }
        Some(Value::String(s)) => parse_amount(s).map_err(|_| ExtractionError::Parse {
            field: label.to_string(),
            value: s.clone(),
        }),
        Some(_) => Err(ExtractionError::Type {
            field: label.to_string(),
            expected: "number".to_string(),
        }),
    }
}

/// Parse a printed amount such as `"₹ 1,23,456.50"`, `"1.234,56"` or `"12,50"`.
///
/// Returns `Ok(None)` when the text holds no digits at all (`""`, `"N/A"`).
pub fn parse_amount(text: &str) -> Result<Option<Decimal>, rust_decimal::Error> {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    let kept = kept.trim_matches(|c| c == '.' || c == ',');

    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return Ok(None);
    }

    let normalized = match (kept.rfind(','), kept.rfind('.')) {
        // European: dots group thousands, comma is the decimal mark
        (Some(comma), Some(dot)) if comma > dot => kept.replace('.', "").replace(',', "."),
        (Some(comma), None) if kept.len() - comma - 1 == 2 => {
            let (whole, fraction) = kept.split_at(comma);
            format!("{}.{}", whole.replace(',', ""), &fraction[1..])
        }
        _ => kept.replace(',', ""),
    };

    Decimal::from_str(&normalized).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_complete_record_defaults() {
        let record = complete_record(object(json!({"invoice_number": "INV-1"})), "source text");

        assert_eq!(record.len(), RECORD_FIELDS.len());
        assert_eq!(record["invoice_number"], json!("INV-1"));
        assert_eq!(record["items"], json!([]));
        assert_eq!(record["raw_text"], json!("source text"));
        assert_eq!(record["total"], Value::Null);
    }

    #[test]
    fn test_complete_record_keeps_values() {
        let record = complete_record(
            object(json!({
                "items": [{"name": "Widget", "quantity": 2}],
                "raw_text": "model copy",
                "extra": true
            })),
            "source text",
        );

        assert_eq!(record["raw_text"], json!("model copy"));
        assert_eq!(record["extra"], json!(true));
        assert_eq!(
            record["items"],
            json!([{"name": "Widget", "quantity": 2, "unit_price": null, "total_price": null}])
        );
    }

    #[test]
    fn test_null_items_become_empty() {
        let record = complete_record(object(json!({"items": null})), "");
        assert_eq!(record["items"], json!([]));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,200.00").unwrap(), Some(dec("1200.00")));
        assert_eq!(parse_amount("Rs. 1,23,456.50").unwrap(), Some(dec("123456.50")));
        assert_eq!(parse_amount("₹ 1,200").unwrap(), Some(dec("1200")));
        assert_eq!(parse_amount("1.234,56").unwrap(), Some(dec("1234.56")));
        assert_eq!(parse_amount("12,50").unwrap(), Some(dec("12.50")));
        assert_eq!(parse_amount("-5.00").unwrap(), Some(dec("-5.00")));
        assert_eq!(parse_amount("N/A").unwrap(), None);
        assert!(parse_amount("1-2-3").is_err());
    }

    #[test]
    fn test_from_map() {
        let map = complete_record(
            object(json!({
                "invoice_number": "INV-7",
                "vendor_name": "Acme Traders",
                "gst_number": "27ABCDE1234F1Z5",
                "subtotal": 100,
                "tax": "18.00",
                "total": 118.0,
                "items": [
                    {"name": "Widget", "quantity": 2, "unit_price": "50", "total_price": 100}
                ]
            })),
            "raw",
        );

        let record = InvoiceRecord::from_map(&map).unwrap();
        assert_eq!(record.invoice_number.as_deref(), Some("INV-7"));
        assert_eq!(record.tax, Some(dec("18.00")));
        assert_eq!(record.total, Some(dec("118")));
        assert_eq!(record.items.len(), 1);
        assert_eq!(record.items[0].unit_price, Some(dec("50")));
        assert_eq!(record.raw_text, "raw");
        assert!(record.validate().is_empty(), "{:?}", record.validate());
    }

    #[test]
    fn test_from_map_rejects_bad_amount() {
        let map = object(json!({"total": "12-34-56"}));
        let err = InvoiceRecord::from_map(&map).unwrap_err();
        assert!(matches!(err, ExtractionError::Parse { ref field, .. } if field == "total"));

        let map = object(json!({"items": [{"quantity": [1]}]}));
        let err = InvoiceRecord::from_map(&map).unwrap_err();
        assert!(matches!(err, ExtractionError::Type { ref field, .. } if field == "items[0].quantity"));
    }

    #[test]
    fn test_validate_reports_mismatches() {
        let record = InvoiceRecord {
            invoice_number: Some("INV-1".to_string()),
            vendor_name: Some("Acme".to_string()),
            subtotal: Some(dec("100")),
            tax: Some(dec("18")),
            total: Some(dec("120")),
            items: vec![LineItem {
                name: Some("Widget".to_string()),
                quantity: Some(dec("2")),
                unit_price: Some(dec("40")),
                total_price: Some(dec("90")),
            }],
            ..InvoiceRecord::default()
        };

        let issues = record.validate();
        assert_eq!(issues.len(), 3, "{:?}", issues);
        assert!(issues[0].starts_with("Item 1 total"));
        assert!(issues[1].starts_with("Line item total"));
        assert!(issues[2].starts_with("Subtotal plus tax"));
    }

    #[test]
    fn test_validate_empty_record() {
        let issues = InvoiceRecord::default().validate();
        assert_eq!(
            issues,
            vec![
                "Missing invoice number",
                "Missing vendor name",
                "Missing total",
                "No line items",
            ]
        );
    }
}
