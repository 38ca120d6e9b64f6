//! Fixed extraction instructions, one per extraction type.

use tenderdesk_core::models::ExtractionType;

const CONFIDENCE_INSTRUCTION: &str = r#"Also include a "confidence" object: {"overall": <0..1>, "fields": {"<fieldName>": <0..1>, ...}} scoring how certain you are of each value you filled in."#;

const RESPONSE_RULES: &str = "Respond with a single JSON object and nothing else. \
Use null for values that are not present in the document; never invent data. \
Dates use ISO 8601 (YYYY-MM-DD). Numbers are plain JSON numbers without thousands separators. \
Documents may be written in English, French or Arabic; keep names in their original script.";

fn schema(extraction_type: ExtractionType) -> &'static str {
    match extraction_type {
        ExtractionType::Tender => {
            r#"{"reference": string, "title": string, "organization": string, "closingDate": string|null, "items": [{"description": string, "quantity": number|null, "unit": string, "notes": string|null}], "notes": string}"#
        }
        ExtractionType::Invoice => {
            r#"{"invoiceNumber": string, "supplier": string, "customer": string, "invoiceDate": string|null, "dueDate": string|null, "currency": string, "items": [{"description": string, "quantity": number|null, "unit": string, "unitPrice": number|null, "total": number|null}], "subtotal": number|null, "tax": number|null, "total": number|null}"#
        }
        ExtractionType::Expense => {
            r#"{"merchant": string, "date": string|null, "category": string, "amount": number|null, "currency": string, "paymentMethod": string, "description": string}"#
        }
        ExtractionType::Delivery => {
            r#"{"deliveryNumber": string, "supplier": string, "recipient": string, "deliveryDate": string|null, "purchaseOrderReference": string, "items": [{"description": string, "quantity": number|null, "unit": string, "notes": string|null}]}"#
        }
        ExtractionType::General => {
            r#"{"title": string, "summary": string, "parties": [string], "dates": [string], "keyValues": {string: string}}"#
        }
    }
}

fn subject(extraction_type: ExtractionType) -> &'static str {
    match extraction_type {
        ExtractionType::Tender => {
            "a public tender document (call for tenders, specifications, bill of quantities or commercial offer) for medical supplies"
        }
        ExtractionType::Invoice => "a supplier invoice, quotation or purchase order",
        ExtractionType::Expense => "an expense receipt",
        ExtractionType::Delivery => "a delivery note",
        ExtractionType::General => "a business document",
    }
}

/// System instruction sent with every request of the given type.
pub fn instruction_for(extraction_type: ExtractionType) -> String {
    format!(
        "You extract structured data from {}.\nReturn JSON matching this shape:\n{}\n{}\n{}",
        subject(extraction_type),
        schema(extraction_type),
        CONFIDENCE_INSTRUCTION,
        RESPONSE_RULES
    )
}
