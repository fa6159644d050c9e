//! Auth service entry point
//!
//! Wires the identity store, token issuer, email dispatcher and HTTP router
//! together. Reads configuration from TOML file
//! (~/.config/auth-service/config.toml).

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use auth_service::application::ports::EmailTransport;
use auth_service::application::services::{
    AuthService, DispatcherConfig, EmailDispatcher, TokenIssuer,
};
use auth_service::config::AppConfig;
use auth_service::domain::UserRepositoryInterface;
use auth_service::infrastructure::database::migrator::Migrator;
use auth_service::infrastructure::{
    init_database, DatabaseConfig, InMemoryUserRepository, LogTransport, SeaOrmUserRepository,
};
use auth_service::support::shutdown::ShutdownCoordinator;
use auth_service::{create_api_router, default_config_path};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("AUTH_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let app_cfg = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level)),
                )
                .init();
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            warn!("Failed to load config: {}. Using defaults.", e);
            AppConfig::default()
        }
    };

    info!("Starting auth service...");

    // Missing signing configuration is fatal at startup, never a
    // per-request error.
    let jwt_config = match app_cfg.jwt_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Invalid security configuration: {}", e);
            return Err(e.into());
        }
    };

    // ── Prometheus metrics recorder (must be installed before any metrics calls) ──
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    // ── Identity store ─────────────────────────────────────────
    let (repo, db): (Arc<dyn UserRepositoryInterface>, Option<DatabaseConnection>) =
        if app_cfg.database.url == "memory" {
            info!("Using in-memory user repository");
            (Arc::new(InMemoryUserRepository::new()), None)
        } else {
            let db_config = DatabaseConfig {
                url: app_cfg.database.url.clone(),
            };
            let db = match init_database(&db_config).await {
                Ok(db) => db,
                Err(e) => {
                    error!("Failed to connect to database: {}", e);
                    return Err(e.into());
                }
            };

            info!("Running database migrations...");
            if let Err(e) = Migrator::up(&db, None).await {
                error!("Failed to run migrations: {}", e);
                return Err(e.into());
            }
            info!("Migrations completed");

            (Arc::new(SeaOrmUserRepository::new(db.clone())), Some(db))
        };

    // ── Email transport ────────────────────────────────────────
    let transport: Arc<dyn EmailTransport> = match app_cfg.email.transport.as_str() {
        "log" => Arc::new(LogTransport),
        other => {
            error!("Unknown email transport '{}'", other);
            return Err(format!("unknown email transport: {other}").into());
        }
    };

    // ── Shutdown coordination ──────────────────────────────────
    let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
    let shutdown_signal = shutdown.signal();
    shutdown.start_signal_listener();

    // ── Background email dispatcher ────────────────────────────
    let (dispatcher, dispatcher_handle) = EmailDispatcher::start(
        transport,
        DispatcherConfig::default(),
        shutdown_signal.clone(),
    );

    // ── Services & router ──────────────────────────────────────
    let tokens = TokenIssuer::new(repo.clone(), jwt_config.clone());
    let auth_service = Arc::new(AuthService::new(repo, tokens, dispatcher));

    let router = create_api_router(auth_service, jwt_config, db.clone(), prometheus_handle);

    let addr = app_cfg.server.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("REST API server listening on http://{}", addr);
    info!("Swagger UI available at http://{}/docs/", addr);

    let serve_shutdown = shutdown_signal.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            serve_shutdown.wait().await;
            info!("HTTP server received shutdown signal");
        })
        .await?;
    info!("HTTP server stopped");

    // In-flight sends get their timeout window; sleeping retries observe
    // the signal and stop without re-enqueueing.
    shutdown
        .finalize(|| async {
            let _ = dispatcher_handle.await;
        })
        .await;

    if let Some(db) = db {
        if let Err(e) = db.close().await {
            warn!("Error closing database connection: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}
