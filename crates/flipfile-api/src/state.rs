//! Shared application state.

use crate::services::ConversionService;
use flipfile_convert::CapabilitySet;
use flipfile_core::Config;
use flipfile_infra::{RateLimiter, StorageJanitor};
use std::sync::Arc;

/// Everything a handler needs, assembled once at startup.
pub struct AppState {
    pub config: Config,
    pub capabilities: CapabilitySet,
    pub janitor: StorageJanitor,
    pub limiter: Arc<RateLimiter>,
    pub conversions: ConversionService,
}
