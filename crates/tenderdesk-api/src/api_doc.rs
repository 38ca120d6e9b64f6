//! OpenAPI documentation.
//! API version is in `crate::constants::API_VERSION`; handler paths are written
//! out in full under `/api/v1`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use tenderdesk_core::{hooks, models};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tenderdesk API",
        version = "0.1.0",
        description = "Document ingestion and AI extraction for tenders, invoices, expenses and delivery notes. All endpoints except /health are versioned under /api/v1/ and require a bearer API key."
    ),
    paths(
        handlers::documents::upload_document,
        handlers::documents::get_document,
        handlers::documents::list_extractions,
        handlers::extraction::extract_document,
        handlers::batch::process_batch,
        handlers::providers::list_providers,
        handlers::health::health_check,
    ),
    components(
        schemas(
            models::Document,
            models::DocumentType,
            models::ModuleType,
            models::Extraction,
            models::ExtractionType,
            models::ExtractionStatus,
            models::Confidence,
            models::ReviewDecision,
            models::BatchResult,
            models::BatchFileResult,
            hooks::ProviderUsageSummary,
            handlers::documents::DocumentDetails,
            handlers::documents::ExtractionView,
            handlers::extraction::ExtractRequest,
            handlers::extraction::ExtractResponse,
            handlers::providers::ProviderView,
            handlers::providers::ProvidersResponse,
            handlers::health::HealthResponse,
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "documents", description = "Document upload and retrieval"),
        (name = "extractions", description = "AI extraction of stored documents"),
        (name = "batch", description = "ZIP archive batch extraction"),
        (name = "providers", description = "Configured AI providers and their usage"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
