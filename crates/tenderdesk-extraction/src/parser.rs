//! Lenient parsing of free-form model output.
//!
//! The first balanced JSON object in the text is taken as the answer. Every field
//! of the expected payload is then read on its own: a missing or malformed field
//! falls back to its default instead of failing the whole extraction, so the
//! result is always structurally complete.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tenderdesk_core::models::{
    Confidence, DeliveryData, ExpenseData, ExtractedData, ExtractionType, GeneralData,
    InvoiceData, LineItem, TenderData,
};

/// Parsed provider output plus anything that had to be defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    pub data: ExtractedData,
    pub confidence: Option<Confidence>,
    pub warnings: Vec<String>,
}

/// Locate the first balanced `{...}` in `text` that parses as a JSON object.
/// Braces inside string literals are ignored.
pub fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&bytes[start..]) {
            if let Ok(Value::Object(map)) = serde_json::from_str(&text[start..start + end]) {
                return Some(map);
            }
        }
        search_from = start + 1;
    }
    None
}

/// Length of the balanced object starting at `bytes[0] == b'{'`, if it closes.
fn balanced_end(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

static NUMBER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:[.,\u{a0} ]\d+)*").ok());

/// Read a number out of text such as `"1,200.50 MAD"`, `"12,5"` or `"3 400"`.
pub fn coerce_number(text: &str) -> Option<f64> {
    let raw: String = NUMBER_PATTERN
        .as_ref()?
        .find(text)?
        .as_str()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();

    let last_dot = raw.rfind('.');
    let last_comma = raw.rfind(',');
    let normalized = match (last_dot, last_comma) {
        (Some(d), Some(c)) if c > d => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (None, Some(c)) => {
            let decimals = raw.len() - c - 1;
            if raw.matches(',').count() == 1 && decimals != 3 {
                raw.replace(',', ".")
            } else {
                raw.replace(',', "")
            }
        }
        (Some(_), None) if raw.matches('.').count() > 1 => raw.replace('.', ""),
        _ => raw,
    };
    normalized.parse().ok()
}

/// Reads fields from one JSON object, recording every value it had to drop.
struct FieldReader<'a> {
    obj: &'a Map<String, Value>,
    warnings: Vec<String>,
}

impl<'a> FieldReader<'a> {
    fn new(obj: &'a Map<String, Value>) -> Self {
        Self {
            obj,
            warnings: Vec::new(),
        }
    }

    fn value(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|k| self.obj.get(*k))
            .find(|v| !v.is_null())
    }

    fn warn(&mut self, keys: &[&str], expected: &str) {
        self.warnings
            .push(format!("field '{}' ignored: expected {}", keys[0], expected));
    }

    fn opt_text(&mut self, keys: &[&str]) -> Option<String> {
        match self.value(keys)? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => {
                self.warn(keys, "text");
                None
            }
        }
    }

    fn text(&mut self, keys: &[&str]) -> String {
        self.opt_text(keys).unwrap_or_default()
    }

    fn number(&mut self, keys: &[&str]) -> Option<f64> {
        let parsed = match self.value(keys)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => coerce_number(s),
            _ => None,
        };
        if parsed.is_none() {
            self.warn(keys, "number");
        }
        parsed
    }

    fn text_list(&mut self, keys: &[&str]) -> Vec<String> {
        match self.value(keys) {
            None => Vec::new(),
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            Some(_) => {
                self.warn(keys, "list of text");
                Vec::new()
            }
        }
    }

    fn text_map(&mut self, keys: &[&str]) -> BTreeMap<String, String> {
        match self.value(keys) {
            None => BTreeMap::new(),
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| {
                    let text = match v {
                        Value::String(s) => s.clone(),
                        Value::Null => return None,
                        other => other.to_string(),
                    };
                    Some((k.clone(), text))
                })
                .collect(),
            Some(_) => {
                self.warn(keys, "object");
                BTreeMap::new()
            }
        }
    }

    fn items(&mut self, keys: &[&str]) -> Vec<LineItem> {
        let values = match self.value(keys) {
            None => return Vec::new(),
            Some(Value::Array(values)) => values,
            Some(_) => {
                self.warn(keys, "list of items");
                return Vec::new();
            }
        };

        let mut items = Vec::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            let Value::Object(obj) = value else {
                self.warnings
                    .push(format!("item {} ignored: expected object", i));
                continue;
            };
            let mut reader = FieldReader::new(obj);
            let item = LineItem {
                description: reader.text(&["description", "name", "item", "designation"]),
                quantity: reader.number(&["quantity", "qty"]),
                unit: reader.text(&["unit", "uom"]),
                unit_price: reader.number(&["unitPrice", "unit_price", "price"]),
                total: reader.number(&["total", "amount", "lineTotal", "line_total"]),
                notes: reader.opt_text(&["notes", "note", "remarks"]),
            };
            self.warnings.extend(
                reader
                    .warnings
                    .into_iter()
                    .map(|w| format!("item {}: {}", i, w)),
            );
            if item.description.is_empty() && item.quantity.is_none() {
                continue;
            }
            items.push(item);
        }
        items
    }
}

fn read_tender(r: &mut FieldReader<'_>) -> TenderData {
    TenderData {
        reference: r.text(&["reference", "tenderReference", "tender_reference", "referenceNumber"]),
        title: r.text(&["title", "subject", "object"]),
        organization: r.text(&["organization", "organisation", "buyer", "issuer"]),
        closing_date: r.opt_text(&["closingDate", "closing_date", "deadline", "submissionDeadline"]),
        items: r.items(&["items", "lineItems", "line_items", "lots"]),
        notes: r.text(&["notes", "remarks"]),
    }
}

fn read_invoice(r: &mut FieldReader<'_>) -> InvoiceData {
    InvoiceData {
        invoice_number: r.text(&["invoiceNumber", "invoice_number", "number", "reference"]),
        supplier: r.text(&["supplier", "vendor", "seller"]),
        customer: r.text(&["customer", "buyer", "client"]),
        invoice_date: r.opt_text(&["invoiceDate", "invoice_date", "date"]),
        due_date: r.opt_text(&["dueDate", "due_date"]),
        currency: r.text(&["currency"]),
        items: r.items(&["items", "lineItems", "line_items"]),
        subtotal: r.number(&["subtotal", "subTotal", "sub_total"]),
        tax: r.number(&["tax", "vat", "taxAmount", "tax_amount"]),
        total: r.number(&["total", "totalAmount", "total_amount", "amount"]),
    }
}

fn read_expense(r: &mut FieldReader<'_>) -> ExpenseData {
    ExpenseData {
        merchant: r.text(&["merchant", "vendor", "supplier", "store"]),
        date: r.opt_text(&["date", "expenseDate", "expense_date"]),
        category: r.text(&["category"]),
        amount: r.number(&["amount", "total", "totalAmount", "total_amount"]),
        currency: r.text(&["currency"]),
        payment_method: r.text(&["paymentMethod", "payment_method"]),
        description: r.text(&["description", "notes"]),
    }
}

fn read_delivery(r: &mut FieldReader<'_>) -> DeliveryData {
    DeliveryData {
        delivery_number: r.text(&["deliveryNumber", "delivery_number", "number", "reference"]),
        supplier: r.text(&["supplier", "sender", "vendor"]),
        recipient: r.text(&["recipient", "customer", "receiver"]),
        delivery_date: r.opt_text(&["deliveryDate", "delivery_date", "date"]),
        purchase_order_reference: r.text(&[
            "purchaseOrderReference",
            "purchase_order_reference",
            "poReference",
            "po_number",
        ]),
        items: r.items(&["items", "lineItems", "line_items"]),
    }
}

fn read_general(r: &mut FieldReader<'_>) -> GeneralData {
    GeneralData {
        title: r.text(&["title", "subject"]),
        summary: r.text(&["summary", "description"]),
        parties: r.text_list(&["parties", "organizations"]),
        dates: r.text_list(&["dates"]),
        key_values: r.text_map(&["keyValues", "key_values", "fields"]),
    }
}

fn score(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => coerce_number(s)?,
        _ => return None,
    };
    // Percentages are accepted and scaled down.
    Some(if raw > 1.0 && raw <= 100.0 {
        raw / 100.0
    } else {
        raw
    })
}

/// Read a `confidence` block: either `{overall, fields: {...}}`, a flat map of
/// scores with an `overall` key, or a bare number.
fn read_confidence(root: &Map<String, Value>) -> Option<Confidence> {
    let value = root
        .get("confidence")
        .or_else(|| root.get("confidenceScores"))
        .or_else(|| root.get("confidence_scores"))?;

    match value {
        Value::Object(map) => {
            let overall = map.get("overall").and_then(score);
            let field_source = match map.get("fields") {
                Some(Value::Object(fields)) => fields,
                _ => map,
            };
            let fields: BTreeMap<String, f64> = field_source
                .iter()
                .filter(|(k, _)| k.as_str() != "overall" && k.as_str() != "fields")
                .filter_map(|(k, v)| score(v).map(|s| (k.clone(), s)))
                .collect();
            if overall.is_none() && fields.is_empty() {
                return None;
            }
            Some(Confidence::new(overall, fields))
        }
        other => score(other).map(|s| Confidence::new(Some(s), BTreeMap::new())),
    }
}

/// Parse raw provider output into the payload for `extraction_type`. Never fails.
pub fn parse_output(raw: &str, extraction_type: ExtractionType) -> ParsedOutput {
    let Some(root) = first_json_object(raw) else {
        return ParsedOutput {
            data: ExtractedData::default_for(extraction_type),
            confidence: None,
            warnings: vec!["no JSON object found in provider output".to_string()],
        };
    };

    // Some models wrap the payload in a `data` envelope next to `confidence`.
    let fields = match root.get("data").or_else(|| root.get("extractedData")) {
        Some(Value::Object(inner)) => inner,
        _ => &root,
    };

    let mut reader = FieldReader::new(fields);
    let data = match extraction_type {
        ExtractionType::Tender => ExtractedData::Tender(read_tender(&mut reader)),
        ExtractionType::Invoice => ExtractedData::Invoice(read_invoice(&mut reader)),
        ExtractionType::Expense => ExtractedData::Expense(read_expense(&mut reader)),
        ExtractionType::Delivery => ExtractedData::Delivery(read_delivery(&mut reader)),
        ExtractionType::General => ExtractedData::General(read_general(&mut reader)),
    };

    ParsedOutput {
        data,
        confidence: read_confidence(&root).or_else(|| read_confidence(fields)),
        warnings: reader.warnings,
    }
}
