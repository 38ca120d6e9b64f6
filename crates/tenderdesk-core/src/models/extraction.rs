use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::document::DocumentType;

/// Shape of structured data requested from a provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum ExtractionType {
    #[serde(rename = "TENDER_EXTRACTION")]
    Tender,
    #[serde(rename = "INVOICE_EXTRACTION")]
    Invoice,
    #[serde(rename = "EXPENSE_EXTRACTION")]
    Expense,
    #[serde(rename = "DELIVERY_EXTRACTION")]
    Delivery,
    #[serde(rename = "GENERAL_EXTRACTION")]
    General,
}

impl ExtractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionType::Tender => "TENDER_EXTRACTION",
            ExtractionType::Invoice => "INVOICE_EXTRACTION",
            ExtractionType::Expense => "EXPENSE_EXTRACTION",
            ExtractionType::Delivery => "DELIVERY_EXTRACTION",
            ExtractionType::General => "GENERAL_EXTRACTION",
        }
    }

    /// Default extraction for a classified document.
    pub fn for_document(document_type: DocumentType) -> Self {
        match document_type {
            t if t.is_tender() => ExtractionType::Tender,
            DocumentType::Invoice | DocumentType::Quotation | DocumentType::PurchaseOrder => {
                ExtractionType::Invoice
            }
            DocumentType::ExpenseReceipt => ExtractionType::Expense,
            DocumentType::DeliveryNote => ExtractionType::Delivery,
            _ => ExtractionType::General,
        }
    }
}

impl Display for ExtractionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TENDER_EXTRACTION" | "TENDER" => Ok(ExtractionType::Tender),
            "INVOICE_EXTRACTION" | "INVOICE" => Ok(ExtractionType::Invoice),
            "EXPENSE_EXTRACTION" | "EXPENSE" => Ok(ExtractionType::Expense),
            "DELIVERY_EXTRACTION" | "DELIVERY" => Ok(ExtractionType::Delivery),
            "GENERAL_EXTRACTION" | "GENERAL" => Ok(ExtractionType::General),
            _ => Err(anyhow::anyhow!("Invalid extraction type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Pending => "PENDING",
            ExtractionStatus::Processing => "PROCESSING",
            ExtractionStatus::Completed => "COMPLETED",
            ExtractionStatus::Failed => "FAILED",
        }
    }
}

impl Display for ExtractionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ExtractionStatus::Pending),
            "PROCESSING" => Ok(ExtractionStatus::Processing),
            "COMPLETED" => Ok(ExtractionStatus::Completed),
            "FAILED" => Ok(ExtractionStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid extraction status: {}", s)),
        }
    }
}

/// One row of a quantity table: tender items, invoice lines, delivered goods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    pub quantity: Option<f64>,
    pub unit: String,
    pub unit_price: Option<f64>,
    pub total: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenderData {
    pub reference: String,
    pub title: String,
    pub organization: String,
    pub closing_date: Option<String>,
    pub items: Vec<LineItem>,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceData {
    pub invoice_number: String,
    pub supplier: String,
    pub customer: String,
    pub invoice_date: Option<String>,
    pub due_date: Option<String>,
    pub currency: String,
    pub items: Vec<LineItem>,
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub total: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseData {
    pub merchant: String,
    pub date: Option<String>,
    pub category: String,
    pub amount: Option<f64>,
    pub currency: String,
    pub payment_method: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryData {
    pub delivery_number: String,
    pub supplier: String,
    pub recipient: String,
    pub delivery_date: Option<String>,
    pub purchase_order_reference: String,
    pub items: Vec<LineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneralData {
    pub title: String,
    pub summary: String,
    pub parties: Vec<String>,
    pub dates: Vec<String>,
    pub key_values: BTreeMap<String, String>,
}

/// Structured payload of a completed extraction, tagged by extraction type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "extractionType")]
pub enum ExtractedData {
    #[serde(rename = "TENDER_EXTRACTION")]
    Tender(TenderData),
    #[serde(rename = "INVOICE_EXTRACTION")]
    Invoice(InvoiceData),
    #[serde(rename = "EXPENSE_EXTRACTION")]
    Expense(ExpenseData),
    #[serde(rename = "DELIVERY_EXTRACTION")]
    Delivery(DeliveryData),
    #[serde(rename = "GENERAL_EXTRACTION")]
    General(GeneralData),
}

impl ExtractedData {
    /// Structurally complete empty payload for the given type.
    pub fn default_for(extraction_type: ExtractionType) -> Self {
        match extraction_type {
            ExtractionType::Tender => ExtractedData::Tender(TenderData::default()),
            ExtractionType::Invoice => ExtractedData::Invoice(InvoiceData::default()),
            ExtractionType::Expense => ExtractedData::Expense(ExpenseData::default()),
            ExtractionType::Delivery => ExtractedData::Delivery(DeliveryData::default()),
            ExtractionType::General => ExtractedData::General(GeneralData::default()),
        }
    }

    pub fn extraction_type(&self) -> ExtractionType {
        match self {
            ExtractedData::Tender(_) => ExtractionType::Tender,
            ExtractedData::Invoice(_) => ExtractionType::Invoice,
            ExtractedData::Expense(_) => ExtractionType::Expense,
            ExtractedData::Delivery(_) => ExtractionType::Delivery,
            ExtractedData::General(_) => ExtractionType::General,
        }
    }
}

/// Provider-reported confidence, every score clamped to [0, 1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Confidence {
    pub overall: Option<f64>,
    #[serde(default)]
    pub fields: BTreeMap<String, f64>,
}

impl Confidence {
    pub fn new(overall: Option<f64>, fields: BTreeMap<String, f64>) -> Self {
        Self {
            overall: overall.map(clamp_score),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k, clamp_score(v)))
                .collect(),
        }
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Advisory review metadata attached to every extraction result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecision {
    pub requires_review: bool,
    pub overall_below_threshold: bool,
    pub missing_confidence: bool,
    pub flagged_fields: Vec<String>,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub id: Uuid,
    pub document_id: Uuid,
    pub extraction_type: ExtractionType,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub status: ExtractionStatus,
    #[schema(value_type = Option<Object>)]
    pub extracted_data: Option<ExtractedData>,
    pub confidence: Option<Confidence>,
    pub processing_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Extraction {
    /// Fresh PROCESSING row for a newly claimed attempt.
    pub fn processing(document_id: Uuid, extraction_type: ExtractionType) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            extraction_type,
            provider: None,
            model: None,
            status: ExtractionStatus::Processing,
            extracted_data: None,
            confidence: None,
            processing_time_ms: None,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Successful result of a provider run, ready to be persisted.
#[derive(Debug, Clone)]
pub struct CompletedExtraction {
    pub provider: String,
    pub model: String,
    pub data: ExtractedData,
    pub confidence: Option<Confidence>,
    pub processing_time_ms: i64,
}
