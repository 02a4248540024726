//! PDF text and page image access.

mod extractor;

pub use extractor::PdfExtractor;

use crate::error::PdfError;
use image::DynamicImage;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Number of pages in the loaded PDF.
    fn page_count(&self) -> u32;

    /// Extract the text of the whole document.
    fn extract_text(&self) -> Result<String>;

    /// Decode the images embedded on a page (1-indexed).
    fn page_images(&self, page: u32) -> Result<Vec<DynamicImage>>;
}
