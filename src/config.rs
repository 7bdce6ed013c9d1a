//! Configuration for medigate
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// medigate - HTTP gateway for the mobile-health backend
#[derive(Parser, Debug, Clone)]
#[command(name = "medigate")]
#[command(about = "HTTP gateway for the mobile-health backend")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "medigate")]
    pub mongodb_db: String,

    /// JWT secret for verifying bearer tokens (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Base URL of the external prediction service
    #[arg(long, env = "PREDICTOR_URL", default_value = "http://127.0.0.1:8000")]
    pub predictor_url: String,

    /// Overpass API endpoint for hospital lookup
    #[arg(
        long,
        env = "OVERPASS_URL",
        default_value = "https://overpass-api.de/api/interpreter"
    )]
    pub overpass_url: String,

    /// Default search radius in meters for hospital lookup
    #[arg(long, env = "HOSPITAL_RADIUS_M", default_value = "5000")]
    pub hospital_radius_m: u32,

    /// Maximum attempts for the sequential-ID counter transaction
    #[arg(long, env = "COUNTER_MAX_ATTEMPTS", default_value = "5")]
    pub counter_max_attempts: u32,

    /// Outbound request timeout in milliseconds (predictor and Overpass)
    #[arg(long, env = "UPSTREAM_TIMEOUT_MS", default_value = "30000")]
    pub upstream_timeout_ms: u64,

    /// Enable development mode (insecure default JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Effective JWT secret.
    ///
    /// Falls back to an insecure dev-only value; `validate()` rejects that
    /// combination outside dev mode before this is ever used.
    pub fn jwt_secret(&self) -> String {
        self.jwt_secret
            .clone()
            .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.counter_max_attempts == 0 {
            return Err("COUNTER_MAX_ATTEMPTS must be at least 1".to_string());
        }

        if self.predictor_url.trim_end_matches('/').is_empty() {
            return Err("PREDICTOR_URL must not be empty".to_string());
        }

        Ok(())
    }
}
