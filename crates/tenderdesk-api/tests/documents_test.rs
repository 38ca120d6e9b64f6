//! Document upload and retrieval integration tests.
//!
//! Run with: `cargo test -p tenderdesk-api --test documents_test`

mod helpers;

use axum_test::multipart::MultipartForm;
use helpers::fixtures::{
    create_minimal_png, create_scanned_pdf, file_part, invoice_text, upload_document,
};
use helpers::{api_path, bearer, setup_test_app, setup_test_app_with_upload, INVOICE_JSON};
use tenderdesk_core::UploadConfig;
use tenderdesk_providers::test_helpers::Script;
use uuid::Uuid;

#[tokio::test]
async fn test_upload_document_returns_created_record() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;
    let client = app.client();

    let module_id = Uuid::new_v4();
    let form = MultipartForm::new()
        .add_text("moduleType", "EXPENSE")
        .add_text("moduleId", module_id.to_string())
        .add_text("description", "March supplies")
        .add_text("tags", "q1, gloves")
        .add_part(
            "file",
            file_part(
                create_scanned_pdf("march"),
                "Invoice_118<copy>.pdf",
                "application/pdf",
            ),
        );

    let response = client
        .post(&api_path("/documents"))
        .add_header("Authorization", bearer())
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 201);
    let body: serde_json::Value = response.json();
    assert_eq!(body["type"], "INVOICE");
    assert_eq!(body["moduleType"], "EXPENSE");
    assert_eq!(body["moduleId"], module_id.to_string());
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["originalName"], "Invoice_118<copy>.pdf");
    assert_eq!(body["tags"], serde_json::json!(["q1", "gloves"]));
    assert_eq!(body["detectedMimeType"], "application/pdf");

    let name = body["name"].as_str().unwrap();
    assert_eq!(name, "Invoice_118copy.pdf");
    let storage_key = body["storageKey"].as_str().unwrap();
    assert!(storage_key.starts_with("documents/expense/"));
    assert!(storage_key.ends_with(name));
}

#[tokio::test]
async fn test_upload_over_body_limit_is_file_too_large() {
    let upload = UploadConfig {
        max_archive_size_bytes: 16 * 1024,
        max_file_size_bytes: 8 * 1024,
        ..UploadConfig::default()
    };
    let app = setup_test_app_with_upload(Script::Respond(INVOICE_JSON.to_string()), upload).await;

    let mut pdf = create_scanned_pdf("oversized");
    pdf.resize(256 * 1024, b' ');
    let form = MultipartForm::new()
        .add_text("moduleType", "TENDER")
        .add_part("file", file_part(pdf, "tender.pdf", "application/pdf"));

    let response = app
        .client()
        .post(&api_path("/documents"))
        .add_header("Authorization", bearer())
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert!(body["error"].as_str().unwrap().contains("File too large"));
}

#[tokio::test]
async fn test_upload_rejects_declared_type_mismatch() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;
    let client = app.client();

    let form = MultipartForm::new()
        .add_text("moduleType", "TENDER")
        .add_part(
            "file",
            file_part(create_minimal_png(), "tender.pdf", "application/pdf"),
        );

    let response = client
        .post(&api_path("/documents"))
        .add_header("Authorization", bearer())
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert!(body["error"].as_str().unwrap().contains("image/png"));
}

#[tokio::test]
async fn test_upload_rejects_script_content() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;
    let client = app.client();

    let form = MultipartForm::new()
        .add_text("moduleType", "GENERAL")
        .add_part(
            "file",
            file_part(
                b"notes <script>alert(1)</script>".to_vec(),
                "notes.txt",
                "text/plain",
            ),
        );

    let response = client
        .post(&api_path("/documents"))
        .add_header("Authorization", bearer())
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_upload_rejects_disallowed_mime() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;
    let client = app.client();

    let form = MultipartForm::new()
        .add_text("moduleType", "GENERAL")
        .add_part(
            "file",
            file_part(b"MZ\x90\x00".to_vec(), "setup.exe", "application/x-msdownload"),
        );

    let response = client
        .post(&api_path("/documents"))
        .add_header("Authorization", bearer())
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_upload_requires_module_type() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;
    let client = app.client();

    let form = MultipartForm::new().add_part(
        "file",
        file_part(invoice_text(), "invoice.txt", "text/plain"),
    );

    let response = client
        .post(&api_path("/documents"))
        .add_header("Authorization", bearer())
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_document_type_override() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;
    let client = app.client();

    let form = MultipartForm::new()
        .add_text("moduleType", "INVENTORY")
        .add_text("documentType", "DELIVERY_NOTE")
        .add_part("file", file_part(invoice_text(), "scan.txt", "text/plain"));

    let response = client
        .post(&api_path("/documents"))
        .add_header("Authorization", bearer())
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 201);
    let body: serde_json::Value = response.json();
    assert_eq!(body["type"], "DELIVERY_NOTE");
}

#[tokio::test]
async fn test_get_document_includes_extractions() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;
    let client = app.client();

    let id = upload_document(client, invoice_text(), "invoice_118.txt", "text/plain", "EXPENSE").await;

    let response = client
        .get(&api_path(&format!("/documents/{}", id)))
        .add_header("Authorization", bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["id"], id.to_string());
    assert_eq!(body["extractions"], serde_json::json!([]));

    client
        .post(&api_path(&format!("/documents/{}/extract", id)))
        .add_header("Authorization", bearer())
        .await
        .assert_status_ok();

    let body: serde_json::Value = client
        .get(&api_path(&format!("/documents/{}", id)))
        .add_header("Authorization", bearer())
        .await
        .json();
    assert_eq!(body["status"], "PROCESSED");
    let extractions = body["extractions"].as_array().unwrap();
    assert_eq!(extractions.len(), 1);
    assert_eq!(extractions[0]["status"], "COMPLETED");
    assert_eq!(extractions[0]["review"]["requiresReview"], true);
}

#[tokio::test]
async fn test_get_unknown_document_is_not_found() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;
    let client = app.client();

    let response = client
        .get(&api_path(&format!("/documents/{}", Uuid::new_v4())))
        .add_header("Authorization", bearer())
        .await;

    assert_eq!(response.status_code(), 404);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");

    let response = client
        .get(&api_path(&format!("/documents/{}/extractions", Uuid::new_v4())))
        .add_header("Authorization", bearer())
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_requests_without_valid_key_are_rejected() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;
    let client = app.client();

    let response = client.get(&api_path("/providers")).await;
    assert_eq!(response.status_code(), 401);

    let response = client
        .get(&api_path("/providers"))
        .add_header("Authorization", "Bearer not-the-right-key")
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = setup_test_app(Script::Respond(INVOICE_JSON.to_string())).await;

    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["providers"], 1);
    assert_eq!(body["database"], "memory");
    assert_eq!(body["storage"], "local");
}
