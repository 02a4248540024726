//! Input routing: turn a file on disk into text or images for a model.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{ExtractionError, Result};
use crate::llm::EncodedImage;
use crate::models::config::{InvexConfig, PdfConfig};
use crate::pdf::{PdfExtractor, PdfProcessor};
use crate::segment::{BoundarySegmenter, DocumentText, Section};

/// How a file is read, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image,
    /// Anything else is read as (lossy) UTF-8 text.
    Text,
}

impl InputKind {
    const IMAGE_EXTENSIONS: &'static [&'static str] =
        &["png", "jpg", "jpeg", "tiff", "tif", "bmp", "webp"];

    pub fn detect(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if ext == "pdf" {
            InputKind::Pdf
        } else if Self::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            InputKind::Image
        } else {
            InputKind::Text
        }
    }
}

/// Model-ready content of an input file.
#[derive(Debug, Clone)]
pub enum LoadedDocument {
    /// Normalized document text.
    Text(DocumentText),
    /// Page images for a vision model.
    Images(Vec<EncodedImage>),
}

/// Load a file as text or images.
///
/// PDFs with at least `min_text_length` characters of text load as text.
/// Other PDFs load their embedded page images, and fail with
/// [`ExtractionError::NoData`] when there are none.
pub fn load_document(path: &Path, config: &PdfConfig) -> Result<LoadedDocument> {
    let kind = InputKind::detect(path);
    debug!("Loading {} as {:?}", path.display(), kind);

    match kind {
        InputKind::Pdf => {
            let data = fs::read(path)?;
            let extractor = PdfExtractor::from_bytes(&data)?;

            if let Some(text) = extractor.usable_text(config.min_text_length) {
                return Ok(LoadedDocument::Text(DocumentText::new(&text)));
            }

            info!("{} has no usable text, falling back to page images", path.display());
            let images = extractor.scanned_images(config.max_images);
            if images.is_empty() {
                return Err(ExtractionError::NoData(format!(
                    "{} has neither extractable text nor decodable images",
                    path.display()
                ))
                .into());
            }

            let encoded = images
                .iter()
                .map(EncodedImage::from_image)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(LoadedDocument::Images(encoded))
        }
        InputKind::Image => {
            let img = image::open(path)?;
            Ok(LoadedDocument::Images(vec![EncodedImage::from_image(&img)?]))
        }
        InputKind::Text => {
            let bytes = fs::read(path)?;
            Ok(LoadedDocument::Text(DocumentText::new(&String::from_utf8_lossy(&bytes))))
        }
    }
}

/// Load a file and split its text into invoice sections.
pub fn split_document(path: &Path, config: &InvexConfig) -> Result<Vec<Section>> {
    let segmenter = BoundarySegmenter::with_config(&config.segmentation)?;
    split_with(path, &config.pdf, &segmenter)
}

/// Load a file and split its text with a prebuilt segmenter.
///
/// Image-only inputs fail with `NoData`.
pub fn split_with(path: &Path, pdf: &PdfConfig, segmenter: &BoundarySegmenter) -> Result<Vec<Section>> {
    match load_document(path, pdf)? {
        LoadedDocument::Text(text) => Ok(segmenter.split(&text)),
        LoadedDocument::Images(_) => Err(ExtractionError::NoData(format!(
            "{} has no text layer to split",
            path.display()
        ))
        .into()),
    }
}
