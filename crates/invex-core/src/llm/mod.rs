//! Language model requests and the client seam.

pub mod prompt;

#[cfg(feature = "native")]
mod chat;

#[cfg(feature = "native")]
pub use chat::ChatClient;

use std::future::Future;
use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use tracing::trace;

use crate::error::LlmError;

/// A base64-encoded image ready for a chat payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime_type: String,
    data: String,
}

impl EncodedImage {
    /// Encode an image as base64 PNG.
    pub fn from_image(img: &DynamicImage) -> Result<Self, image::ImageError> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

        let data = STANDARD.encode(&buf);
        trace!("Encoded {}x{} image as {} base64 bytes", img.width(), img.height(), data.len());

        Ok(Self {
            mime_type: "image/png".to_string(),
            data,
        })
    }

    /// `data:` URL accepted by OpenAI-compatible vision endpoints.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// What to ask the model.
#[derive(Debug, Clone)]
pub enum ModelRequest {
    /// A text prompt for the text model.
    Text { prompt: String },
    /// Page images for the vision model.
    Vision { images: Vec<EncodedImage> },
}

impl ModelRequest {
    /// Schema prompt around invoice text.
    pub fn invoice_text(text: &str) -> Self {
        ModelRequest::Text {
            prompt: prompt::invoice_prompt(text),
        }
    }

    pub fn invoice_images(images: Vec<EncodedImage>) -> Self {
        ModelRequest::Vision { images }
    }
}

/// A chat model that answers a request with raw response text.
///
/// The response is not parsed; callers run it through the repairer.
pub trait ModelClient: Send + Sync {
    fn complete(
        &self,
        request: &ModelRequest,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_encode_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let encoded = EncodedImage::from_image(&img).unwrap();

        assert_eq!(encoded.mime_type, "image/png");
        let decoded = STANDARD.decode(&encoded.data).unwrap();
        assert_eq!(&decoded[1..4], b"PNG");
        assert!(encoded.data_url().starts_with("data:image/png;base64,iVBOR"));
    }

    #[test]
    fn test_invoice_text_request_embeds_text() {
        match ModelRequest::invoice_text("TAX INVOICE 42") {
            ModelRequest::Text { prompt } => assert!(prompt.contains("\"\"\"TAX INVOICE 42\"\"\"")),
            other => panic!("unexpected request: {:?}", other),
        }
    }
}
