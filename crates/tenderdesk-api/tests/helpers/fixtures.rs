//! Test fixtures: minimal PNG/PDF blobs, ZIP archives and upload helpers.

use std::io::{Cursor, Write};

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::ZipWriter;

use super::{api_path, bearer};

/// Minimal valid 1x1 PNG bytes.
pub fn create_minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8,
        0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x18, 0xDD, 0x8D, 0x89, 0x00, 0x00, 0x00,
        0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ]
}

/// PDF header followed by no readable text, so extraction goes through vision.
pub fn create_scanned_pdf(label: &str) -> Vec<u8> {
    format!("%PDF-1.4\n% scanned {}\n%%EOF\n", label).into_bytes()
}

/// Plain-text invoice long enough to be sent to providers as text.
pub fn invoice_text() -> Vec<u8> {
    b"FACTURE N INV-2024-118\nFournisseur: Pharma Distrib SARL\nClient: Clinique Al Amal\n\
      Gants nitrile x500 .......... 2400.00 MAD\nCompresses steriles x200 .... 2420.50 MAD\n\
      Total TTC: 4820.50 MAD\n"
        .to_vec()
}

pub fn build_zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        for (name, data) in entries {
            zip.start_file(*name, FileOptions::default())
                .expect("Failed to start zip entry");
            zip.write_all(data).expect("Failed to write zip entry");
        }
        zip.finish().expect("Failed to finish zip");
    }
    buffer
}

pub fn file_part(data: Vec<u8>, file_name: &str, mime_type: &str) -> Part {
    Part::bytes(bytes::Bytes::from(data))
        .file_name(file_name.to_string())
        .mime_type(mime_type.to_string())
}

/// Upload a document and return the created id, asserting a 201.
pub async fn upload_document(
    client: &TestServer,
    data: Vec<u8>,
    file_name: &str,
    mime_type: &str,
    module_type: &str,
) -> Uuid {
    let form = MultipartForm::new()
        .add_text("moduleType", module_type.to_string())
        .add_part("file", file_part(data, file_name, mime_type));

    let response = client
        .post(&api_path("/documents"))
        .add_header("Authorization", bearer())
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 201, "{}", response.text());
    let body: serde_json::Value = response.json();
    Uuid::parse_str(body["id"].as_str().expect("Expected 'id' in upload response"))
        .expect("Invalid UUID in upload response")
}
