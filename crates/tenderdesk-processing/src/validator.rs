//! File validator
//!
//! Pure checks over an upload's bytes, run in a fixed order: size, MIME
//! allow-list, magic-byte signature, dangerous content. The first failure wins.
//! Filename sanitization is applied to every accepted upload.

use tenderdesk_core::{UploadConfig, ValidationError};

/// Number of leading bytes scanned for embedded script or executable markers.
const SCAN_WINDOW: usize = 1000;
const MAX_FILENAME_LENGTH: usize = 255;

const MIME_PDF: &str = "application/pdf";
const MIME_PNG: &str = "image/png";
const MIME_JPEG: &str = "image/jpeg";
const MIME_GIF: &str = "image/gif";
const MIME_WEBP: &str = "image/webp";
const MIME_ZIP: &str = "application/zip";
const MIME_OLE: &str = "application/x-ole-storage";

const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MARKERS: &[u8] = &[0xE0, 0xE1, 0xE2, 0xE3, 0xE8, 0xDB, 0xEE];
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const SCRIPT_MARKERS: &[&str] = &["<script", "<?php", "<?=", "<%"];

/// Detect a file format from its leading bytes.
pub fn detect_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"%PDF") {
        Some(MIME_PDF)
    } else if data.starts_with(PNG_MAGIC) {
        Some(MIME_PNG)
    } else if data.len() >= 4
        && data[..3] == [0xFF, 0xD8, 0xFF]
        && JPEG_MARKERS.contains(&data[3])
    {
        Some(MIME_JPEG)
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some(MIME_GIF)
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        Some(MIME_WEBP)
    } else if data.starts_with(b"PK\x03\x04") {
        Some(MIME_ZIP)
    } else if data.starts_with(OLE_MAGIC) {
        Some(MIME_OLE)
    } else {
        None
    }
}

/// Lowercase a declared MIME type, drop parameters and fold common aliases.
pub fn normalize_mime(content_type: &str) -> String {
    let base = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    match base.as_str() {
        "image/jpg" | "image/pjpeg" => MIME_JPEG.to_string(),
        "application/x-pdf" => MIME_PDF.to_string(),
        "application/csv" | "text/comma-separated-values" => "text/csv".to_string(),
        _ => base,
    }
}

/// Signature a declared type must carry, if it has one.
fn expected_signature(declared: &str) -> Option<&'static str> {
    match declared {
        MIME_PDF => Some(MIME_PDF),
        MIME_PNG => Some(MIME_PNG),
        MIME_JPEG => Some(MIME_JPEG),
        MIME_GIF => Some(MIME_GIF),
        MIME_WEBP => Some(MIME_WEBP),
        MIME_ZIP | "application/x-zip-compressed" => Some(MIME_ZIP),
        d if d.starts_with("application/vnd.openxmlformats-officedocument.") => Some(MIME_ZIP),
        "application/msword" | "application/vnd.ms-excel" | "application/vnd.ms-powerpoint" => {
            Some(MIME_OLE)
        }
        _ => None,
    }
}

/// Keep only the last path component, strip traversal, illegal and control
/// characters, and cap the length at 255 bytes while keeping the extension.
pub fn sanitize_filename(filename: &str) -> String {
    let last = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .replace("..", "");

    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*'))
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();

    if cleaned.is_empty() {
        return "file".to_string();
    }
    if cleaned.len() <= MAX_FILENAME_LENGTH {
        return cleaned.to_string();
    }

    let (stem, ext) = match cleaned.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() <= 16 => (stem, Some(ext)),
        _ => (cleaned, None),
    };
    let budget = MAX_FILENAME_LENGTH - ext.map(|e| e.len() + 1).unwrap_or(0);
    let mut end = budget.min(stem.len());
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    match ext {
        Some(ext) => format!("{}.{}", &stem[..end], ext),
        None => stem[..end].to_string(),
    }
}

fn scan_dangerous(data: &[u8]) -> Option<String> {
    if data.starts_with(b"MZ") {
        return Some("windows executable".to_string());
    }
    if data.starts_with(b"\x7FELF") {
        return Some("elf executable".to_string());
    }

    let window = data[..data.len().min(SCAN_WINDOW)].to_ascii_lowercase();
    SCRIPT_MARKERS
        .iter()
        .find(|marker| {
            window
                .windows(marker.len())
                .any(|w| w == marker.as_bytes())
        })
        .map(|marker| marker.to_string())
}

/// An upload that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFile {
    pub sanitized_name: String,
    /// Declared type after normalization.
    pub mime_type: String,
    pub detected_mime_type: Option<String>,
    pub size: usize,
}

/// Upload validator configured from the upload section of the configuration.
#[derive(Debug, Clone)]
pub struct FileValidator {
    max_file_size: usize,
    allowed_content_types: Vec<String>,
}

impl FileValidator {
    pub fn new(max_file_size: usize, allowed_content_types: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_content_types: allowed_content_types
                .iter()
                .map(|ct| normalize_mime(ct))
                .collect(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            config.max_file_size_bytes,
            config.allowed_content_types.clone(),
        )
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    pub fn validate_content_type(&self, content_type: &str) -> Result<String, ValidationError> {
        let normalized = normalize_mime(content_type);
        if !self.allowed_content_types.contains(&normalized) {
            return Err(ValidationError::MimeNotAllowed {
                content_type: content_type.to_string(),
            });
        }
        Ok(normalized)
    }

    /// Check the byte signature against the declared type.
    pub fn validate_signature(
        &self,
        data: &[u8],
        declared: &str,
    ) -> Result<Option<&'static str>, ValidationError> {
        let detected = detect_mime(data);
        let mismatch = match (expected_signature(declared), detected) {
            (Some(expected), Some(found)) => expected != found,
            (Some(_), None) => true,
            // Text declared but the bytes are a known binary format.
            (None, Some(_)) => declared.starts_with("text/"),
            (None, None) => false,
        };

        if mismatch {
            return Err(ValidationError::TypeMismatch {
                declared: declared.to_string(),
                detected: detected.unwrap_or("unknown").to_string(),
            });
        }
        Ok(detected)
    }

    pub fn validate_content(&self, data: &[u8]) -> Result<(), ValidationError> {
        match scan_dangerous(data) {
            Some(marker) => Err(ValidationError::DangerousContent { marker }),
            None => Ok(()),
        }
    }

    /// Run every check in order and return the sanitized view of the upload.
    pub fn validate(
        &self,
        data: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<ValidatedFile, ValidationError> {
        self.validate_file_size(data.len())?;
        let mime_type = self.validate_content_type(content_type)?;
        let detected = self.validate_signature(data, &mime_type)?;
        self.validate_content(data)?;

        Ok(ValidatedFile {
            sanitized_name: sanitize_filename(filename),
            mime_type,
            detected_mime_type: detected.map(String::from),
            size: data.len(),
        })
    }
}
