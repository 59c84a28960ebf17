//! Root and health handlers.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

/// Service banner.
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Document conversion service is running"
    }))
}

#[derive(serde::Serialize)]
struct DependencyStatus {
    text_extract: bool,
    docx_write: bool,
    pdf_write: bool,
    rasterizer: bool,
}

#[derive(serde::Serialize)]
struct HealthCheckResponse {
    status: String,
    timestamp: String,
    version: String,
    dependencies: DependencyStatus,
}

/// Health check: overall status plus per-back-end availability.
///
/// Reports 200 as long as the process is up; a missing optional back-end
/// degrades the status string without failing the probe.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let capabilities = &state.capabilities;

    let dependencies = DependencyStatus {
        text_extract: capabilities.text_extract(),
        docx_write: capabilities.docx(),
        pdf_write: capabilities.pdf_write(),
        rasterizer: capabilities.rasterizer(),
    };

    let all_available = dependencies.text_extract
        && dependencies.docx_write
        && dependencies.pdf_write
        && dependencies.rasterizer;

    let response = HealthCheckResponse {
        status: if all_available {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dependencies,
    };

    (StatusCode::OK, Json(response))
}
