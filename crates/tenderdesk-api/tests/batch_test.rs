//! Batch archive integration tests.
//!
//! Run with: `cargo test -p tenderdesk-api --test batch_test`

mod helpers;

use axum_test::multipart::MultipartForm;
use helpers::fixtures::{build_zip, create_minimal_png, create_scanned_pdf, file_part};
use helpers::{api_path, bearer, setup_test_app, setup_test_app_with_upload, INVOICE_JSON};
use tenderdesk_core::UploadConfig;
use tenderdesk_providers::test_helpers::Script;

fn archive_form(archive: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part("file", file_part(archive, "batch.zip", "application/zip"))
}

#[tokio::test]
async fn test_batch_counts_only_supported_entries() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;

    let archive = build_zip(&[
        ("invoices/invoice_01.pdf", create_scanned_pdf("1")),
        ("invoices/invoice_02.pdf", create_scanned_pdf("2")),
        (".DS_Store", b"\0\0\0\x01Bud1".to_vec()),
        ("invoices/invoice_03.pdf", create_scanned_pdf("3")),
        ("readme.txt", b"scanned on the office copier".to_vec()),
        ("invoices/invoice_04.pdf", create_scanned_pdf("4")),
        ("invoices/invoice_05.pdf", create_scanned_pdf("5")),
    ]);

    let response = app
        .client()
        .post(&api_path("/extractions/batch"))
        .add_header("Authorization", bearer())
        .multipart(archive_form(archive))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["totalFiles"], 5);
    assert_eq!(body["successful"], 5);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["cancelled"], false);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 5);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result["index"], i);
        assert_eq!(result["success"], true);
        assert_eq!(result["requiresReview"], true);
    }
    assert_eq!(app.provider.calls(), 5);
}

#[tokio::test]
async fn test_batch_isolates_invalid_entry() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;

    let archive = build_zip(&[
        ("a.pdf", create_scanned_pdf("a")),
        ("fake.pdf", create_minimal_png()),
        ("c.png", create_minimal_png()),
    ]);

    let response = app
        .client()
        .post(&api_path("/extractions/batch"))
        .add_header("Authorization", bearer())
        .multipart(archive_form(archive))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["totalFiles"], 3);
    assert_eq!(body["successful"], 2);
    assert_eq!(body["failed"], 1);
    let failed = &body["results"][1];
    assert_eq!(failed["fileName"], "fake.pdf");
    assert_eq!(failed["success"], false);
    assert!(failed["error"].as_str().is_some());
    assert!(failed.get("data").is_none());
}

#[tokio::test]
async fn test_batch_rejects_non_archive() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;

    let response = app
        .client()
        .post(&api_path("/extractions/batch"))
        .add_header("Authorization", bearer())
        .multipart(archive_form(create_scanned_pdf("not a zip")))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(app.provider.calls(), 0);
}

#[tokio::test]
async fn test_batch_without_supported_entries_is_rejected() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;

    let archive = build_zip(&[("readme.txt", b"nothing to see".to_vec())]);

    let response = app
        .client()
        .post(&api_path("/extractions/batch"))
        .add_header("Authorization", bearer())
        .multipart(archive_form(archive))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_batch_requires_file_field() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;

    let response = app
        .client()
        .post(&api_path("/extractions/batch"))
        .add_header("Authorization", bearer())
        .multipart(MultipartForm::new().add_text("note", "no archive"))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_batch_over_body_limit_is_archive_too_large() {
    let upload = UploadConfig {
        max_archive_size_bytes: 16 * 1024,
        max_file_size_bytes: 8 * 1024,
        ..UploadConfig::default()
    };
    let app = setup_test_app_with_upload(Script::Respond(INVOICE_JSON.to_string()), upload).await;

    let response = app
        .client()
        .post(&api_path("/extractions/batch"))
        .add_header("Authorization", bearer())
        .multipart(archive_form(vec![0u8; 256 * 1024]))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Archive too large"));
    assert_eq!(app.provider.calls(), 0);
}
