use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use tenderdesk_core::ProviderUsageSummary;
use tenderdesk_providers::ProviderCapabilities;
use utoipa::ToSchema;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderView {
    pub name: String,
    pub model: String,
    /// Zero-based position in the fallback order
    pub position: usize,
    #[schema(value_type = Object)]
    pub capabilities: ProviderCapabilities,
    /// Aggregated attempts since the usage log began; absent if never called
    pub usage: Option<ProviderUsageSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderView>,
    pub timeout_secs: u64,
}

#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "providers",
    responses(
        (status = 200, description = "Configured providers in fallback order", body = ProvidersResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_providers(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut usage = state.usage.summarize().await?;

    let providers = state
        .chain
        .describe()
        .into_iter()
        .enumerate()
        .map(|(position, info)| {
            let summary = usage
                .iter()
                .position(|u| u.provider == info.name)
                .map(|i| usage.swap_remove(i));
            ProviderView {
                name: info.name,
                model: info.model,
                position,
                capabilities: info.capabilities,
                usage: summary,
            }
        })
        .collect();

    Ok(Json(ProvidersResponse {
        providers,
        timeout_secs: state.chain.timeout().as_secs(),
    }))
}
