//! Document classifier
//!
//! Infers a [`DocumentType`] from the filename (Latin and Arabic keywords) and the
//! MIME type. Rules are evaluated in order and the first match wins; anything
//! unmatched is `OTHER`.

use tenderdesk_core::models::DocumentType;

const TENDER_KEYWORDS: &[&str] = &["tender", "rfp", "rfq", "مناقصة", "عطاء", "ممارسة"];
const SPECS_KEYWORDS: &[&str] = &["spec", "technical", "مواصفات", "كراسة الشروط"];
const BOQ_KEYWORDS: &[&str] = &["boq", "bill of quantities", "quantities", "جدول الكميات", "كميات"];
const COMMERCIAL_KEYWORDS: &[&str] = &["commercial", "financial", "price", "تجاري", "مالي", "أسعار"];

/// Ordered rules applied when the filename is not a tender document.
const RULES: &[(&[&str], DocumentType)] = &[
    (&["invoice", "inv_", "inv-", "فاتورة"], DocumentType::Invoice),
    (&["receipt", "expense", "إيصال", "ايصال", "مصروف"], DocumentType::ExpenseReceipt),
    (
        &["delivery note", "delivery", "dn_", "dn-", "إذن تسليم", "اذن تسليم", "تسليم"],
        DocumentType::DeliveryNote,
    ),
    (
        &["purchase order", "purchase_order", "po_", "po-", "أمر شراء", "امر شراء"],
        DocumentType::PurchaseOrder,
    ),
    (&["contract", "agreement", "عقد", "اتفاقية"], DocumentType::Contract),
    (&["certificate", "cert", "شهادة"], DocumentType::Certificate),
    (&["quotation", "quote", "عرض سعر"], DocumentType::Quotation),
    (
        &["datasheet", "data sheet", "data_sheet", "brochure", "نشرة"],
        DocumentType::ProductDatasheet,
    ),
];

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

fn is_spreadsheet(mime: &str) -> bool {
    let mime = mime.to_lowercase();
    mime == "text/csv"
        || mime == "application/vnd.ms-excel"
        || mime.contains("spreadsheetml")
}

fn refine_tender(name: &str, mime: &str) -> DocumentType {
    if contains_any(name, SPECS_KEYWORDS) {
        DocumentType::TenderSpecs
    } else if contains_any(name, BOQ_KEYWORDS) {
        DocumentType::TenderBoq
    } else if contains_any(name, COMMERCIAL_KEYWORDS) {
        DocumentType::TenderCommercial
    } else if is_spreadsheet(mime) {
        DocumentType::TenderBoq
    } else {
        DocumentType::TenderDocument
    }
}

/// Classify a document. Total: every input yields a type.
pub fn classify(filename: &str, mime: &str) -> DocumentType {
    // Underscores and dashes separate words in most exported filenames.
    let name = filename.to_lowercase().replace(['_', '-'], " ");
    let raw = filename.to_lowercase();

    if contains_any(&name, TENDER_KEYWORDS) {
        return refine_tender(&name, mime);
    }

    RULES
        .iter()
        .find(|(keywords, _)| contains_any(&name, keywords) || contains_any(&raw, keywords))
        .map(|(_, ty)| *ty)
        .unwrap_or(DocumentType::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tender_refinement() {
        assert_eq!(
            classify("Tender_MOH_2024_specs.pdf", "application/pdf"),
            DocumentType::TenderSpecs
        );
        assert_eq!(
            classify("tender-boq.pdf", "application/pdf"),
            DocumentType::TenderBoq
        );
        assert_eq!(
            classify("RFQ commercial offer.pdf", "application/pdf"),
            DocumentType::TenderCommercial
        );
        assert_eq!(
            classify("tender 1182.pdf", "application/pdf"),
            DocumentType::TenderDocument
        );
    }

    #[test]
    fn test_spreadsheet_inside_tender_is_boq() {
        assert_eq!(
            classify(
                "tender_1182.xlsx",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            ),
            DocumentType::TenderBoq
        );
        // Spreadsheets outside a tender are not BOQs.
        assert_eq!(
            classify("stock.xlsx", "application/vnd.ms-excel"),
            DocumentType::Other
        );
    }

    #[test]
    fn test_arabic_keywords() {
        assert_eq!(
            classify("مناقصة مستشفى - مواصفات.pdf", "application/pdf"),
            DocumentType::TenderSpecs
        );
        assert_eq!(classify("فاتورة 77.pdf", "application/pdf"), DocumentType::Invoice);
        assert_eq!(
            classify("إذن تسليم.jpg", "image/jpeg"),
            DocumentType::DeliveryNote
        );
        assert_eq!(classify("عرض سعر.pdf", "application/pdf"), DocumentType::Quotation);
    }

    #[test]
    fn test_latin_rules_in_order() {
        assert_eq!(classify("INV_0042.pdf", "application/pdf"), DocumentType::Invoice);
        assert_eq!(
            classify("taxi receipt.jpg", "image/jpeg"),
            DocumentType::ExpenseReceipt
        );
        assert_eq!(
            classify("PO_991.pdf", "application/pdf"),
            DocumentType::PurchaseOrder
        );
        assert_eq!(
            classify("service agreement.pdf", "application/pdf"),
            DocumentType::Contract
        );
        assert_eq!(
            classify("ISO cert.pdf", "application/pdf"),
            DocumentType::Certificate
        );
        assert_eq!(
            classify("ventilator datasheet.pdf", "application/pdf"),
            DocumentType::ProductDatasheet
        );
        // invoice outranks quotation
        assert_eq!(
            classify("invoice for quote 5.pdf", "application/pdf"),
            DocumentType::Invoice
        );
    }

    #[test]
    fn test_unmatched_is_other() {
        assert_eq!(classify("scan0001.png", "image/png"), DocumentType::Other);
        assert_eq!(classify("", ""), DocumentType::Other);
    }
}
