//! Tenderdesk Processing Library
//!
//! Byte-level work on uploaded files before any provider sees them: validation,
//! document classification, text/image extraction and archive unpacking.

pub mod archive;
pub mod classifier;
pub mod extractor;
pub mod validator;

pub use archive::{ArchiveEntry, ArchiveReader};
pub use classifier::classify;
pub use extractor::{ContentExtractor, EncodedImage, ExtractedContent};
pub use validator::{detect_mime, normalize_mime, sanitize_filename, FileValidator, ValidatedFile};
