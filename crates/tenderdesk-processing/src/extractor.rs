//! Text and image extraction for provider consumption.
//!
//! PDFs go through `pdf-extract` on a blocking thread. A PDF whose text layer is
//! empty, shorter than the configured minimum or unreadable is reported as
//! insufficient so the caller falls back to a vision request. Extraction never
//! fails outright.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

/// Written by some PDF toolchains in place of a text layer they could not produce.
pub const PDF_EXTRACTION_FAILED_MARKER: &str = "[PDF_EXTRACTION_FAILED]";

/// Base64 payload of an image (or a whole document) sent to vision providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedImage {
    pub media_type: String,
    pub data: String,
}

impl EncodedImage {
    pub fn from_bytes(media_type: &str, bytes: &[u8]) -> Self {
        Self {
            media_type: media_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    pub text: String,
    pub images: Vec<EncodedImage>,
    /// Whether `text` is good enough for a text-only provider request.
    pub sufficient: bool,
}

impl ExtractedContent {
    fn text(text: String, sufficient: bool) -> Self {
        Self {
            text,
            images: Vec::new(),
            sufficient,
        }
    }

    pub fn needs_vision(&self) -> bool {
        !self.sufficient
    }
}

#[derive(Debug, Clone)]
pub struct ContentExtractor {
    min_text_chars: usize,
}

impl ContentExtractor {
    pub fn new(min_text_chars: usize) -> Self {
        Self { min_text_chars }
    }

    pub fn is_sufficient(&self, text: &str) -> bool {
        if text.contains(PDF_EXTRACTION_FAILED_MARKER) {
            return false;
        }
        let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
        meaningful > 0 && meaningful >= self.min_text_chars
    }

    pub async fn extract(&self, data: &[u8], mime_type: &str) -> ExtractedContent {
        match mime_type {
            m if m.starts_with("image/") => ExtractedContent {
                text: String::new(),
                images: vec![EncodedImage::from_bytes(m, data)],
                sufficient: false,
            },
            "text/plain" | "text/csv" => {
                let text = String::from_utf8_lossy(data).into_owned();
                let sufficient = !text.trim().is_empty();
                ExtractedContent::text(text, sufficient)
            }
            "application/pdf" => {
                let text = extract_pdf_text(data.to_vec()).await;
                let sufficient = self.is_sufficient(&text);
                if !sufficient {
                    tracing::debug!(
                        chars = text.chars().count(),
                        min_chars = self.min_text_chars,
                        "PDF text layer insufficient, vision required"
                    );
                }
                ExtractedContent::text(text, sufficient)
            }
            other => {
                tracing::debug!(mime_type = %other, "No text layer reader for type");
                ExtractedContent::default()
            }
        }
    }
}

/// Read the PDF text layer. Errors and panics inside the parser become an empty
/// string so the caller treats the document as scanned.
async fn extract_pdf_text(data: Vec<u8>) -> String {
    let result = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data)).await;

    match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "PDF text extraction failed");
            String::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "PDF text extraction task aborted");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_image_is_encoded_without_text() {
        let extractor = ContentExtractor::new(100);
        let content = extractor.extract(&[0x89, 0x50, 0x4E, 0x47], "image/png").await;
        assert!(content.text.is_empty());
        assert!(content.needs_vision());
        assert_eq!(content.images.len(), 1);
        assert_eq!(content.images[0].media_type, "image/png");
        assert!(content.images[0].data_uri().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_plain_text_is_decoded() {
        let extractor = ContentExtractor::new(100);
        let content = extractor.extract("Qty,Item\n5,Syringe".as_bytes(), "text/csv").await;
        assert_eq!(content.text, "Qty,Item\n5,Syringe");
        assert!(content.sufficient);
        assert!(content.images.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_insufficient_not_error() {
        let extractor = ContentExtractor::new(100);
        let content = extractor
            .extract(b"%PDF-1.4\nthis is not a real pdf", "application/pdf")
            .await;
        assert!(content.needs_vision());
    }

    #[test]
    fn test_sufficiency_threshold() {
        let extractor = ContentExtractor::new(10);
        assert!(!extractor.is_sufficient(""));
        assert!(!extractor.is_sufficient("   \n\t  "));
        assert!(!extractor.is_sufficient("a b c d e"));
        assert!(extractor.is_sufficient("abcdefghij"));
        assert!(!extractor.is_sufficient(&format!(
            "{} {}",
            "x".repeat(200),
            PDF_EXTRACTION_FAILED_MARKER
        )));
    }

    #[tokio::test]
    async fn test_office_documents_need_vision() {
        let extractor = ContentExtractor::new(100);
        let content = extractor
            .extract(b"PK\x03\x04", "application/vnd.ms-excel")
            .await;
        assert!(content.needs_vision());
        assert!(content.images.is_empty());
    }
}
