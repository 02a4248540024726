//! Regex patterns for invoice boundary detection and text normalization.

use lazy_static::lazy_static;
use regex::Regex;

/// Phrases that commonly start a new invoice in a multi-invoice document.
pub const DEFAULT_BOUNDARY_PATTERNS: &[&str] = &[
    r"\bTAX\s+INVOICE\b",
    r"\bBILL\s+OF\s+SUPPLY\b",
    r"\bINVOICE\s+NO\b",
    r"\bInvoice Number\b",
    r"\bInvoice No\b",
    r"\bInvoice\s*:\b",
    r"\bORDER\s+NUMBER\b",
    r"\bGSTIN\b",
    r"\bBill To\b",
    r"\bSold By\b",
    r"\bTax Invoice\b",
];

lazy_static! {
    // All boundary phrases as one case-insensitive alternation
    pub static ref BOUNDARY_PATTERN: Regex = Regex::new(
        &format!("(?i){}", DEFAULT_BOUNDARY_PATTERNS.join("|"))
    ).unwrap();

    // Bare "Invoice" token used by the fallback split
    pub static ref INVOICE_TOKEN: Regex = Regex::new(r"(?i)\bInvoice\b").unwrap();

    // Line break normalization
    pub static ref LINE_BREAKS: Regex = Regex::new(r"\r\n|\r").unwrap();

    pub static ref BLANK_RUNS: Regex = Regex::new(r"\n{3,}").unwrap();
}
