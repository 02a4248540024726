//! Prompt text sent to the models.

/// System prompt for text requests.
pub const TEXT_SYSTEM_PROMPT: &str = "You are an invoice parsing assistant. Return ONLY JSON.";

/// System prompt for image requests.
pub const VISION_SYSTEM_PROMPT: &str = "Extract invoice fields and return ONLY JSON.";

/// User instruction sent alongside page images.
pub const VISION_INSTRUCTION: &str = "Return structured JSON following the schema.";

const SCHEMA: &str = r#"{
  "invoice_number": string or null,
  "date": string or null,
  "vendor_name": string or null,
  "buyer_name": string or null,
  "gst_number": string or null,
  "currency": string or null,
  "subtotal": number or null,
  "tax": number or null,
  "total": number or null,
  "items": [
    {
      "name": string or null,
      "quantity": number or null,
      "unit_price": number or null,
      "total_price": number or null
    }
  ],
  "raw_text": string
}"#;

/// Build the extraction prompt for one invoice's text.
pub fn invoice_prompt(invoice_text: &str) -> String {
    format!(
        "You are an invoice parsing expert. Extract fields and return ONLY valid JSON (no explanation).\n\n\
         Schema:\n{}\n\n\
         Invoice text:\n\"\"\"{}\"\"\"\n",
        SCHEMA, invoice_text
    )
}
