//! medigate entry point

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use medigate::auth::{AuthGate, JwtVerifier};
use medigate::config::Args;
use medigate::db::{MongoClient, MongoCounterStore, MongoRoleDirectory};
use medigate::idgen::SequentialIdAllocator;
use medigate::server::{self, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("medigate={},info", args.log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("medigate starting");
    info!("node_id: {}", args.node_id);
    info!("listen: {}", args.listen);
    info!("database: {}", args.mongodb_db);
    info!("predictor: {}", args.predictor_url);
    if args.dev_mode {
        info!("dev mode enabled (insecure JWT secret fallback)");
    }

    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("failed to connect to MongoDB: {}", e);
            std::process::exit(1);
        }
    };

    let verifier = Arc::new(JwtVerifier::new(&args.jwt_secret()));
    let directory = Arc::new(MongoRoleDirectory::new(mongo.clone()));
    let gate = Arc::new(AuthGate::new(verifier, directory));

    let store = Arc::new(MongoCounterStore::new(mongo.clone()));
    let allocator = Arc::new(SequentialIdAllocator::new(store, args.counter_max_attempts));

    let http = match reqwest::Client::builder()
        .timeout(Duration::from_millis(args.upstream_timeout_ms))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            error!("failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        args,
        mongo,
        gate,
        allocator,
        http,
    });

    if let Err(e) = server::run(state).await {
        error!("server error: {}", e);
        std::process::exit(1);
    }
}
