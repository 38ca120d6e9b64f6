//! Validation errors raised while accepting uploaded files and archives.
//!
//! Every variant names the rule that was violated so the message can be shown to
//! the uploader unchanged.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File is empty")]
    EmptyFile,

    #[error("File too large: {size} bytes exceeds max {max} bytes")]
    FileTooLarge { size: usize, max: usize },

    #[error("Content type '{content_type}' is not allowed")]
    MimeNotAllowed { content_type: String },

    #[error("File content does not match declared type '{declared}' (detected: {detected})")]
    TypeMismatch { declared: String, detected: String },

    #[error("File contains potentially dangerous content ({marker})")]
    DangerousContent { marker: String },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Upload is not a ZIP archive")]
    NotAnArchive,

    #[error("Archive too large: {size} bytes exceeds max {max} bytes")]
    ArchiveTooLarge { size: usize, max: usize },

    #[error("Archive contains no supported files (allowed extensions: {allowed})")]
    NoSupportedEntries { allowed: String },

    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),
}

impl ValidationError {
    /// Short machine-readable rule name, used in logs and batch results.
    pub fn rule(&self) -> &'static str {
        match self {
            ValidationError::EmptyFile => "empty_file",
            ValidationError::FileTooLarge { .. } => "file_too_large",
            ValidationError::MimeNotAllowed { .. } => "mime_not_allowed",
            ValidationError::TypeMismatch { .. } => "type_mismatch",
            ValidationError::DangerousContent { .. } => "dangerous_content",
            ValidationError::InvalidFilename(_) => "invalid_filename",
            ValidationError::NotAnArchive => "not_an_archive",
            ValidationError::ArchiveTooLarge { .. } => "archive_too_large",
            ValidationError::NoSupportedEntries { .. } => "no_supported_entries",
            ValidationError::CorruptArchive(_) => "corrupt_archive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_rule() {
        let err = ValidationError::FileTooLarge {
            size: 11,
            max: 10,
        };
        assert_eq!(err.to_string(), "File too large: 11 bytes exceeds max 10 bytes");
        assert_eq!(err.rule(), "file_too_large");

        let err = ValidationError::TypeMismatch {
            declared: "application/pdf".to_string(),
            detected: "image/png".to_string(),
        };
        assert!(err.to_string().contains("application/pdf"));
        assert!(err.to_string().contains("image/png"));
    }
}
