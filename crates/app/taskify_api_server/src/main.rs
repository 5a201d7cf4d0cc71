//! Taskify API server binary.
//!
//! Connects to PostgreSQL (or an in-memory store for local runs), applies
//! migrations and seed data, starts the background sweepers and serves the
//! REST API until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;

use taskify_api::AppState;
use taskify_api::config::{ApiConfig, DEFAULT_CACHE_CAPACITY_BYTES};
use taskify_core::auth::jwt::resolve_jwt_secret;
use taskify_core::seed::{SeedOptions, seed_defaults};
use taskify_core::store::{MemoryStore, PgStore, Store};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "taskify_api_server", about = "Taskify API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/taskify"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,

    /// Keep all data in process memory instead of PostgreSQL.
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// Entity cache budget, in cost units (approximate bytes).
    #[arg(long, env = "CACHE_CAPACITY_BYTES", default_value_t = DEFAULT_CACHE_CAPACITY_BYTES)]
    cache_capacity_bytes: u64,

    /// General limiter refill rate (requests per second per IP).
    #[arg(long, env = "RATE_LIMIT_RPS", default_value_t = 1.0)]
    rate_limit_rps: f64,

    /// General limiter burst size.
    #[arg(long, env = "RATE_LIMIT_BURST", default_value_t = 10)]
    rate_limit_burst: u32,

    /// Auth endpoint limiter refill rate.
    #[arg(long, env = "AUTH_RATE_LIMIT_RPS", default_value_t = 0.5)]
    auth_rate_limit_rps: f64,

    /// Auth endpoint limiter burst size.
    #[arg(long, env = "AUTH_RATE_LIMIT_BURST", default_value_t = 3)]
    auth_rate_limit_burst: u32,

    /// Seconds of inactivity before a client's rate-limit bucket is dropped.
    #[arg(long, env = "RATE_LIMIT_IDLE_SECS", default_value_t = 180)]
    rate_limit_idle_secs: u64,

    /// Period of the idle-bucket and expired-token sweepers, in seconds.
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 60)]
    sweep_interval_secs: u64,

    /// Create `admin` / `admin@localhost` with this password if absent.
    #[arg(long, env = "BOOTSTRAP_ADMIN_PASSWORD")]
    bootstrap_admin_password: Option<String>,
}

impl Args {
    fn api_config(&self) -> ApiConfig {
        ApiConfig {
            bind_addr: self.bind_addr.clone(),
            database_url: self.database_url.clone(),
            jwt_secret: resolve_jwt_secret(),
            cache_capacity_bytes: self.cache_capacity_bytes,
            general_rate_per_sec: self.rate_limit_rps,
            general_burst: self.rate_limit_burst,
            auth_rate_per_sec: self.auth_rate_limit_rps,
            auth_burst: self.auth_rate_limit_burst,
            rate_limit_idle_secs: self.rate_limit_idle_secs,
            sweep_interval_secs: self.sweep_interval_secs,
            bootstrap_admin_password: self.bootstrap_admin_password.clone(),
        }
    }
}

async fn connect_store(args: &Args) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    if args.in_memory {
        info!("using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    info!(max_connections = args.max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    taskify_core::migrate::migrate(&pool).await?;
    Ok(Arc::new(PgStore::new(pool)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,taskify_api=debug,taskify_core=debug".into()),
        )
        .init();

    let args = Args::parse();
    info!(bind_addr = %args.bind_addr, in_memory = args.in_memory, "starting taskify_api_server");

    let store = connect_store(&args).await?;
    let config = args.api_config();
    seed_defaults(
        store.as_ref(),
        &SeedOptions {
            admin_password: config.bootstrap_admin_password.clone(),
        },
    )
    .await?;

    let state = AppState::new(&config, store)?;

    // Background sweepers, stopped on shutdown.
    let shutdown = CancellationToken::new();
    let sweepers = [
        tokio::spawn(
            state
                .general_limiter
                .clone()
                .run_sweeper(config.sweep_interval(), shutdown.clone()),
        ),
        tokio::spawn(
            state
                .auth_limiter
                .clone()
                .run_sweeper(config.sweep_interval(), shutdown.clone()),
        ),
        tokio::spawn(
            state
                .auth
                .rotator()
                .clone()
                .run_reaper(config.sweep_interval(), shutdown.clone()),
        ),
    ];

    let app = taskify_api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let serve_result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            shutdown.cancel();
        }
    })
    .await;

    shutdown.cancel();
    for sweeper in sweepers {
        let _ = sweeper.await;
    }

    serve_result?;
    Ok(())
}
