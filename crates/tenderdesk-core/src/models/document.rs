use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Business meaning of a stored document, inferred at upload time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    TenderDocument,
    TenderSpecs,
    TenderBoq,
    TenderCommercial,
    Invoice,
    ExpenseReceipt,
    DeliveryNote,
    PurchaseOrder,
    Contract,
    Certificate,
    Quotation,
    ProductDatasheet,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::TenderDocument => "TENDER_DOCUMENT",
            DocumentType::TenderSpecs => "TENDER_SPECS",
            DocumentType::TenderBoq => "TENDER_BOQ",
            DocumentType::TenderCommercial => "TENDER_COMMERCIAL",
            DocumentType::Invoice => "INVOICE",
            DocumentType::ExpenseReceipt => "EXPENSE_RECEIPT",
            DocumentType::DeliveryNote => "DELIVERY_NOTE",
            DocumentType::PurchaseOrder => "PURCHASE_ORDER",
            DocumentType::Contract => "CONTRACT",
            DocumentType::Certificate => "CERTIFICATE",
            DocumentType::Quotation => "QUOTATION",
            DocumentType::ProductDatasheet => "PRODUCT_DATASHEET",
            DocumentType::Other => "OTHER",
        }
    }

    pub fn is_tender(&self) -> bool {
        matches!(
            self,
            DocumentType::TenderDocument
                | DocumentType::TenderSpecs
                | DocumentType::TenderBoq
                | DocumentType::TenderCommercial
        )
    }
}

impl Display for DocumentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TENDER_DOCUMENT" => Ok(DocumentType::TenderDocument),
            "TENDER_SPECS" => Ok(DocumentType::TenderSpecs),
            "TENDER_BOQ" => Ok(DocumentType::TenderBoq),
            "TENDER_COMMERCIAL" => Ok(DocumentType::TenderCommercial),
            "INVOICE" => Ok(DocumentType::Invoice),
            "EXPENSE_RECEIPT" => Ok(DocumentType::ExpenseReceipt),
            "DELIVERY_NOTE" => Ok(DocumentType::DeliveryNote),
            "PURCHASE_ORDER" => Ok(DocumentType::PurchaseOrder),
            "CONTRACT" => Ok(DocumentType::Contract),
            "CERTIFICATE" => Ok(DocumentType::Certificate),
            "QUOTATION" => Ok(DocumentType::Quotation),
            "PRODUCT_DATASHEET" => Ok(DocumentType::ProductDatasheet),
            "OTHER" => Ok(DocumentType::Other),
            _ => Err(anyhow::anyhow!("Invalid document type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "PENDING",
            DocumentStatus::Processing => "PROCESSING",
            DocumentStatus::Processed => "PROCESSED",
            DocumentStatus::Failed => "FAILED",
        }
    }
}

impl Display for DocumentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(DocumentStatus::Pending),
            "PROCESSING" => Ok(DocumentStatus::Processing),
            "PROCESSED" => Ok(DocumentStatus::Processed),
            "FAILED" => Ok(DocumentStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid document status: {}", s)),
        }
    }
}

/// Business module that owns a document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleType {
    Tender,
    Budget,
    Inventory,
    Expense,
    Customer,
    General,
}

impl ModuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleType::Tender => "TENDER",
            ModuleType::Budget => "BUDGET",
            ModuleType::Inventory => "INVENTORY",
            ModuleType::Expense => "EXPENSE",
            ModuleType::Customer => "CUSTOMER",
            ModuleType::General => "GENERAL",
        }
    }
}

impl Display for ModuleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TENDER" => Ok(ModuleType::Tender),
            "BUDGET" => Ok(ModuleType::Budget),
            "INVENTORY" => Ok(ModuleType::Inventory),
            "EXPENSE" => Ok(ModuleType::Expense),
            "CUSTOMER" => Ok(ModuleType::Customer),
            "GENERAL" => Ok(ModuleType::General),
            _ => Err(anyhow::anyhow!("Invalid module type: {}", s)),
        }
    }
}

/// A stored, validated upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    /// Sanitized filename; the only name that ever reaches a storage key.
    pub name: String,
    pub original_name: String,
    pub mime_type: String,
    pub detected_mime_type: Option<String>,
    pub size: i64,
    pub storage_key: String,
    pub url: String,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub module_type: ModuleType,
    pub module_id: Option<Uuid>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub status: DocumentStatus,
    pub uploaded_by_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Fields needed to persist a new document. Status starts at PENDING.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub original_name: String,
    pub mime_type: String,
    pub detected_mime_type: Option<String>,
    pub size: i64,
    pub storage_key: String,
    pub url: String,
    pub document_type: DocumentType,
    pub module_type: ModuleType,
    pub module_id: Option<Uuid>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub uploaded_by_id: Option<String>,
}

impl NewDocument {
    pub fn into_document(self, id: Uuid, created_at: DateTime<Utc>) -> Document {
        Document {
            id,
            name: self.name,
            original_name: self.original_name,
            mime_type: self.mime_type,
            detected_mime_type: self.detected_mime_type,
            size: self.size,
            storage_key: self.storage_key,
            url: self.url,
            document_type: self.document_type,
            module_type: self.module_type,
            module_id: self.module_id,
            description: self.description,
            tags: self.tags,
            status: DocumentStatus::Pending,
            uploaded_by_id: self.uploaded_by_id,
            created_at,
            processed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_type_round_trips_through_str() {
        for ty in [
            DocumentType::TenderBoq,
            DocumentType::ExpenseReceipt,
            DocumentType::ProductDatasheet,
            DocumentType::Other,
        ] {
            assert_eq!(ty.as_str().parse::<DocumentType>().ok(), Some(ty));
        }
        assert!("SPREADSHEET".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_document_serializes_camel_case_with_type_key() {
        let doc = NewDocument {
            name: "invoice.pdf".to_string(),
            original_name: "../invoice.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            detected_mime_type: Some("application/pdf".to_string()),
            size: 42,
            storage_key: "documents/expense/x-invoice.pdf".to_string(),
            url: "http://localhost/files/documents/expense/x-invoice.pdf".to_string(),
            document_type: DocumentType::Invoice,
            module_type: ModuleType::Expense,
            module_id: None,
            description: None,
            tags: vec!["q3".to_string()],
            uploaded_by_id: None,
        }
        .into_document(Uuid::new_v4(), Utc::now());

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["type"], "INVOICE");
        assert_eq!(json["moduleType"], "EXPENSE");
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["originalName"], "../invoice.pdf");
        assert!(json.get("processedAt").is_some());
    }

    #[test]
    fn test_tender_family() {
        assert!(DocumentType::TenderSpecs.is_tender());
        assert!(!DocumentType::Quotation.is_tender());
    }
}
