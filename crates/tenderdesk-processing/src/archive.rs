//! ZIP archive unpacking for batch extraction.
//!
//! Only supported document entries are returned, in archive order. Directory
//! entries, macOS resource forks and OS metadata files are dropped. Entry names are
//! reduced to their base name so archive paths never reach storage or logs.

use std::io::{Cursor, Read};
use std::path::Path;

use tenderdesk_core::{UploadConfig, ValidationError};
use zip::ZipArchive;

const IGNORED_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// One supported file taken from an archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    /// Uncompressed size reported by the archive; `data` is capped when larger.
    pub size: u64,
    /// Set when the entry could not be decompressed.
    pub read_error: Option<String>,
}

/// MIME type implied by a filename extension.
pub fn mime_from_extension(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "xls" => "application/vnd.ms-excel",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => return None,
    };
    Some(mime)
}

fn base_name(path: &str) -> Option<&str> {
    path.rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
}

fn is_metadata_entry(path: &str, base: &str) -> bool {
    path.starts_with("__MACOSX/")
        || path.contains("/__MACOSX/")
        || base.starts_with("._")
        || IGNORED_NAMES.iter().any(|n| n.eq_ignore_ascii_case(base))
}

#[derive(Debug, Clone)]
pub struct ArchiveReader {
    max_archive_size: usize,
    max_entry_size: usize,
    allowed_extensions: Vec<String>,
}

impl ArchiveReader {
    pub fn new(
        max_archive_size: usize,
        max_entry_size: usize,
        allowed_extensions: Vec<String>,
    ) -> Self {
        Self {
            max_archive_size,
            max_entry_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            config.max_archive_size_bytes,
            config.max_file_size_bytes,
            config.batch_allowed_extensions.clone(),
        )
    }

    fn is_allowed(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.allowed_extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }

    /// Check size and container signature before any decompression.
    pub fn check_archive(&self, data: &[u8]) -> Result<(), ValidationError> {
        if data.len() > self.max_archive_size {
            return Err(ValidationError::ArchiveTooLarge {
                size: data.len(),
                max: self.max_archive_size,
            });
        }
        if !data.starts_with(b"PK\x03\x04") && !data.starts_with(b"PK\x05\x06") {
            return Err(ValidationError::NotAnArchive);
        }
        Ok(())
    }

    /// Unpack supported entries. Blocking; see [`ArchiveReader::unpack_async`].
    pub fn unpack(&self, data: &[u8]) -> Result<Vec<ArchiveEntry>, ValidationError> {
        self.check_archive(data)?;

        let mut archive = ZipArchive::new(Cursor::new(data))
            .map_err(|e| ValidationError::CorruptArchive(e.to_string()))?;

        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut file = match archive.by_index(i) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(index = i, error = %e, "Skipping unreadable archive entry");
                    continue;
                }
            };

            if file.is_dir() {
                continue;
            }
            let path = file.name().to_string();
            let Some(base) = base_name(&path) else {
                continue;
            };
            if is_metadata_entry(&path, base) || !self.is_allowed(base) {
                tracing::debug!(entry = %path, "Skipping unsupported archive entry");
                continue;
            }

            let size = file.size();
            let mut buf = Vec::new();
            let read_error = (&mut file)
                .take(self.max_entry_size as u64 + 1)
                .read_to_end(&mut buf)
                .err()
                .map(|e| e.to_string());

            entries.push(ArchiveEntry {
                name: base.to_string(),
                mime_type: mime_from_extension(base)
                    .unwrap_or("application/octet-stream")
                    .to_string(),
                data: buf,
                size,
                read_error,
            });
        }

        if entries.is_empty() {
            return Err(ValidationError::NoSupportedEntries {
                allowed: self.allowed_extensions.join(", "),
            });
        }

        Ok(entries)
    }

    pub async fn unpack_async(&self, data: Vec<u8>) -> Result<Vec<ArchiveEntry>, ValidationError> {
        let reader = self.clone();
        tokio::task::spawn_blocking(move || reader.unpack(&data))
            .await
            .map_err(|e| ValidationError::CorruptArchive(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            let options = FileOptions::default();
            for (name, data) in entries {
                if name.ends_with('/') {
                    zip.add_directory(*name, options).unwrap();
                } else {
                    zip.start_file(*name, options).unwrap();
                    zip.write_all(data).unwrap();
                }
            }
            zip.finish().unwrap();
        }
        buffer
    }

    fn reader() -> ArchiveReader {
        ArchiveReader::from_config(&UploadConfig::default())
    }

    #[test]
    fn test_filters_metadata_and_unsupported_entries() {
        let zip = build_zip(&[
            ("invoices/", b""),
            ("invoices/a.pdf", b"%PDF-1.4 a"),
            ("invoices/b.PDF", b"%PDF-1.4 b"),
            ("__MACOSX/invoices/._a.pdf", b"junk"),
            ("invoices/._c.pdf", b"junk"),
            (".DS_Store", b"junk"),
            ("readme.txt", b"hello"),
            ("scan.jpg", &[0xFF, 0xD8, 0xFF, 0xE0]),
        ]);

        let entries = reader().unpack(&zip).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.PDF", "scan.jpg"]);
        assert_eq!(entries[2].mime_type, "image/jpeg");
        assert_eq!(entries[0].data, b"%PDF-1.4 a");
    }

    #[test]
    fn test_paths_are_reduced_to_base_names() {
        let zip = build_zip(&[("../../etc/evil.pdf", b"%PDF-1.4")]);
        let entries = reader().unpack(&zip).unwrap();
        assert_eq!(entries[0].name, "evil.pdf");
    }

    #[test]
    fn test_no_supported_entries_is_error() {
        let zip = build_zip(&[("notes.txt", b"x"), (".DS_Store", b"x")]);
        let err = reader().unpack(&zip).unwrap_err();
        assert!(matches!(err, ValidationError::NoSupportedEntries { .. }));
    }

    #[test]
    fn test_rejects_non_zip_and_oversized() {
        assert_eq!(
            reader().unpack(b"%PDF-1.4").unwrap_err(),
            ValidationError::NotAnArchive
        );

        let small = ArchiveReader::new(10, 10, vec!["pdf".to_string()]);
        let zip = build_zip(&[("a.pdf", b"%PDF-1.4")]);
        assert!(matches!(
            small.unpack(&zip).unwrap_err(),
            ValidationError::ArchiveTooLarge { .. }
        ));
    }

    #[test]
    fn test_oversized_entry_is_capped_not_dropped() {
        let big = vec![b'a'; 64];
        let zip = build_zip(&[("big.pdf", &big)]);
        let reader = ArchiveReader::new(1024 * 1024, 16, vec!["pdf".to_string()]);
        let entries = reader.unpack(&zip).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 64);
        assert_eq!(entries[0].data.len(), 17);
    }

    #[tokio::test]
    async fn test_unpack_async() {
        let zip = build_zip(&[("a.png", &[0x89, 0x50, 0x4E, 0x47])]);
        let entries = reader().unpack_async(zip).await.unwrap();
        assert_eq!(entries[0].mime_type, "image/png");
    }
}
