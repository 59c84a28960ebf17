pub mod routes;
pub mod server;

use crate::services::ConversionService;
use crate::state::AppState;
use axum::Router;
use flipfile_convert::CapabilitySet;
use flipfile_core::Config;
use flipfile_infra::{RateLimiter, StorageJanitor};
use std::sync::Arc;
use std::time::Duration;

/// Build all services and the router.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, Router), anyhow::Error> {
    let capabilities = CapabilitySet::detect(&config);

    let janitor = StorageJanitor::new(config.upload_dir().clone()).await?;

    // Reclaim anything left behind by a previous run before accepting work.
    let swept = janitor
        .sweep(Duration::from_secs(config.sweep_max_age_secs()))
        .await?;
    if swept > 0 {
        tracing::info!(swept, "Startup sweep removed stale artifacts");
    }

    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit(),
        Duration::from_secs(config.rate_window_secs()),
    ));

    let drivers = flipfile_convert::default_drivers(&capabilities);
    let conversions = ConversionService::new(
        janitor.clone(),
        capabilities.clone(),
        drivers,
        config.max_file_size_bytes(),
        Duration::from_secs(config.sweep_max_age_secs()),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        capabilities,
        janitor,
        limiter,
        conversions,
    });

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
