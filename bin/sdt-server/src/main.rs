//! Simple Diet Tracker Server
//!
//! Serves the accounts and records REST API:
//! - POST /accounts/login, POST /accounts/registration, GET /accounts/me
//! - GET/POST /records, DELETE /records/{recordId}
//! - GET /health, OpenAPI at /q/openapi, Swagger UI at /swagger-ui
//!
//! ## Configuration
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `CONFIG_PATH` | Path to the TOML config file (or `--config`) |
//! | `APP_SECRET` | Overrides `app_secret` |
//! | `APP_ID` | Overrides `app_id` |
//! | `RUST_LOG` | Overrides the environment's log level |

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use sdt_config::Config;
use sdt_platform::api::{create_router, AppState, TokenVerifier};
use sdt_platform::client::{HttpIdentityClient, IdentityClientConfig};
use sdt_platform::repository::SqliteStorage;
use sdt_platform::service::{AccountService, AuthService, RecordService};

#[derive(Parser, Debug)]
#[command(name = "sdt-server")]
#[command(about = "Simple Diet Tracker API server")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, env = "CONFIG_PATH")]
    config: String,

    /// Apply pending migrations before serving
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;

    sdt_common::init_logging(config.env);
    info!(env = %config.env, "Starting Simple Diet Tracker");

    let storage = SqliteStorage::connect(&config.storage_path)
        .await
        .context("failed to open storage")?;

    if args.migrate {
        let applied = storage.migrate().await.context("failed to apply migrations")?;
        info!("Applied {} migrations", applied);
    }
    let storage = Arc::new(storage);

    let identity = HttpIdentityClient::new(IdentityClientConfig {
        base_url: config.clients.identity.address.clone(),
        app_id: config.app_id(),
        timeout: config.clients.identity.timeout(),
        retries_count: config.clients.identity.retries_count,
        ..IdentityClientConfig::default()
    })
    .context("failed to build identity client")?;
    info!("Identity client targets {}", config.clients.identity.address);

    let account_service = Arc::new(AccountService::new(storage.clone()));
    let auth_service = Arc::new(AuthService::new(Arc::new(identity), account_service.clone()));
    let record_service = Arc::new(RecordService::new(storage, account_service.clone()));

    let app = create_router(AppState {
        auth_service,
        account_service,
        record_service,
        verifier: Arc::new(TokenVerifier::new(&config.app_secret)),
        request_timeout: config.http_server.timeout(),
    })
    .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&config.http_server.address)
        .await
        .with_context(|| format!("failed to bind {}", config.http_server.address))?;
    info!("API server listening on http://{}", config.http_server.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(sdt_common::shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}
