//! Shared setup for router-level tests: a real app over a temp storage root
//! with the real conversion drivers, plus raw multipart body construction.

use axum::Router;
use flipfile_api::services::ConversionService;
use flipfile_api::setup::routes::setup_routes;
use flipfile_api::state::AppState;
use flipfile_convert::CapabilitySet;
use flipfile_core::Config;
use flipfile_infra::{RateLimiter, StorageJanitor};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const BOUNDARY: &str = "TESTBOUNDARY";

/// An app wired like production, except storage lives under `root` and the
/// rasterizer is left unprobed (its route reports unavailable).
pub async fn test_app(root: &Path) -> Router {
    let config = Config::from_env().unwrap();
    let janitor = StorageJanitor::new(root).await.unwrap();
    let capabilities = CapabilitySet::assume_all();
    let drivers = flipfile_convert::default_drivers(&capabilities);
    let conversions = ConversionService::new(
        janitor.clone(),
        capabilities.clone(),
        drivers,
        50 * 1024 * 1024,
        Duration::from_secs(3600),
    );
    let state = Arc::new(AppState {
        config: config.clone(),
        capabilities,
        janitor,
        limiter: Arc::new(RateLimiter::new(1000, Duration::from_secs(60))),
        conversions,
    });
    setup_routes(&config, state).unwrap()
}

/// Build a multipart/form-data body with one file field per entry.
pub fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, data) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
