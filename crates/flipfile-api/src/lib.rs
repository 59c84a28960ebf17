//! HTTP layer of the conversion service: routing, middleware, and the
//! request orchestrator that ties the drivers to the storage janitor.

pub mod client_ip;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod setup;
pub mod state;
