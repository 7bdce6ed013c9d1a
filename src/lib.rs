//! medigate - HTTP gateway for a mobile-health backend
//!
//! Verifies bearer credentials, enforces role-based access against fresh
//! role lookups, hands out collision-free sequential identifiers backed by
//! transactional counters, and proxies prediction and map lookups to their
//! upstream services.

pub mod auth;
pub mod config;
pub mod db;
pub mod idgen;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{GatewayError, Result};
