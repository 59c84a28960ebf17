//! Per-client request rate limiting.

pub use limiter::RateLimiter;

mod limiter;
