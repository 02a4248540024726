//! PDF extraction using lopdf and pdf-extract.

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::{PdfProcessor, Result};
use crate::error::PdfError;

/// PDF extractor backed by lopdf for structure and pdf-extract for text.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    /// Create an extractor with `data` already loaded.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut extractor = Self::new();
        extractor.load(data)?;
        Ok(extractor)
    }

    /// Extracted text when its trimmed length reaches `min_chars` characters.
    ///
    /// Extraction failures count as "no text": scanned PDFs often make
    /// pdf-extract fail outright.
    pub fn usable_text(&self, min_chars: usize) -> Option<String> {
        match self.extract_text() {
            Ok(text) if trimmed_len(&text) >= min_chars => Some(text),
            Ok(text) => {
                debug!("PDF text too short ({} chars)", trimmed_len(&text));
                None
            }
            Err(e) => {
                warn!("PDF text extraction failed: {}", e);
                None
            }
        }
    }

    /// Embedded images of every page in page order, at most `limit` of them.
    pub fn scanned_images(&self, limit: usize) -> Vec<DynamicImage> {
        let mut images = Vec::new();
        for page in 1..=self.page_count() {
            if images.len() >= limit {
                break;
            }
            match self.page_images(page) {
                Ok(found) => images.extend(found),
                Err(e) => warn!("Skipping images on page {}: {}", page, e),
            }
        }

        if images.is_empty() {
            images = self.document_images();
        }
        images.truncate(limit);
        debug!("Collected {} page images", images.len());
        images
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))
    }

    /// Images anywhere in the document, for PDFs whose pages reference
    /// images indirectly.
    fn document_images(&self) -> Vec<DynamicImage> {
        let Ok(doc) = self.document() else {
            return Vec::new();
        };

        let images: Vec<DynamicImage> = doc
            .objects
            .values()
            .filter_map(|object| decode_image(doc, object))
            .collect();

        debug!("Found {} images in document objects", images.len());
        images
    }

    fn page_resources(&self, doc: &Document, node_id: ObjectId) -> Option<Dictionary> {
        let Object::Dictionary(dict) = doc.get_object(node_id).ok()? else {
            return None;
        };

        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
                return Some(res_dict.clone());
            }
        }

        // Resources are inherited from the page tree
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.page_resources(doc, *parent_id),
            _ => None,
        }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract reads the raw bytes, so keep the decrypted copy
            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_text(&self) -> Result<String> {
        if self.raw_data.is_empty() {
            return Err(PdfError::TextExtraction("No document loaded".to_string()));
        }
        pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    fn page_images(&self, page: u32) -> Result<Vec<DynamicImage>> {
        let doc = self.document()?;
        let pages = doc.get_pages();
        let page_id = pages.get(&page).ok_or(PdfError::InvalidPage(page))?;

        let mut images = Vec::new();
        let Some(resources) = self.page_resources(doc, *page_id) else {
            return Ok(images);
        };

        if let Ok(xobjects) = resources.get(b"XObject") {
            if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
                for (_name, obj_ref) in xobj_dict.iter() {
                    if let Ok((_, obj)) = doc.dereference(obj_ref) {
                        if let Some(img) = decode_image(doc, obj) {
                            images.push(img);
                        }
                    }
                }
            }
        }

        trace!("Decoded {} images on page {}", images.len(), page);
        Ok(images)
    }
}

fn trimmed_len(text: &str) -> usize {
    text.trim().chars().count()
}

/// Decode an image XObject stream. Unsupported encodings yield `None`.
fn decode_image(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                    .ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Skipping {}x{} image with unsupported filter", width, height);
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8) as u8;

    image_from_raw(&data, width, height, color_space, bits)
}

/// Build an RGBA image from 8-bit RGB or grayscale samples.
fn image_from_raw(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
    bits_per_component: u8,
) -> Option<DynamicImage> {
    if bits_per_component != 8 {
        trace!("Unsupported bits per component: {}", bits_per_component);
        return None;
    }

    let pixels = (width as usize) * (height as usize);
    let rgba: Vec<u8> = match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => data[..pixels * 3]
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
        b"DeviceGray" | b"G" if data.len() >= pixels => data[..pixels]
            .iter()
            .flat_map(|&g| [g, g, g, 255])
            .collect(),
        _ => {
            trace!(
                "Could not decode {:?} image: {} bytes for {}x{}",
                String::from_utf8_lossy(color_space),
                data.len(),
                width,
                height
            );
            return None;
        }
    };

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_extractor_is_empty() {
        let extractor = PdfExtractor::new();
        assert!(extractor.document.is_none());
        assert_eq!(extractor.page_count(), 0);
        assert!(extractor.extract_text().is_err());
        assert!(extractor.scanned_images(4).is_empty());
        assert!(extractor.usable_text(1).is_none());
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = PdfExtractor::from_bytes(b"definitely not a pdf").err();
        assert!(matches!(err, Some(PdfError::Parse(_))));
    }

    #[test]
    fn test_image_from_raw_gray() {
        let img = image_from_raw(&[0, 128, 255, 64], 2, 2, b"DeviceGray", 8).unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));
        assert_eq!(img.to_rgba8().get_pixel(1, 0).0, [128, 128, 128, 255]);
    }

    #[test]
    fn test_image_from_raw_rejects_short_data() {
        assert!(image_from_raw(&[1, 2, 3], 2, 2, b"DeviceRGB", 8).is_none());
        assert!(image_from_raw(&[0; 16], 2, 2, b"DeviceRGB", 1).is_none());
        assert!(image_from_raw(&[0; 16], 2, 2, b"DeviceCMYK", 8).is_none());
    }

    #[test]
    fn test_trimmed_len_ignores_outer_whitespace() {
        assert_eq!(trimmed_len(" a b\n\tc "), 6);
    }
}
