//! Storage key generation for uploaded documents.

use tenderdesk_core::models::ModuleType;
use uuid::Uuid;

/// Build the storage key for a document owned by `module`.
///
/// `sanitized_name` must already be sanitized; the uuid prefix keeps keys unique
/// when two uploads share a filename.
pub fn generate_document_key(module: ModuleType, id: Uuid, sanitized_name: &str) -> String {
    format!(
        "documents/{}/{}-{}",
        module.as_str().to_lowercase(),
        id,
        sanitized_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            generate_document_key(ModuleType::Tender, id, "boq.xlsx"),
            "documents/tender/00000000-0000-0000-0000-000000000000-boq.xlsx"
        );
    }
}
