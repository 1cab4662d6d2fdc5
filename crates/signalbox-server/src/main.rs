//! Signalbox server entry point.
//!
//! Bootstraps the settings store and admin directory, then starts the Axum
//! HTTP server with graceful shutdown.

use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::middleware as axum_mw;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use signalbox_store::{MemorySettingsStore, SettingsStore};

use signalbox_server::auth::{admin_auth_middleware, DirectoryUser, Role, StaticDirectory, UserDirectory};
use signalbox_server::config::{ServerConfig, StoreBackendType};
use signalbox_server::routes;
use signalbox_server::state::AppState;

use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment.
    let config = ServerConfig::from_env();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(store = ?config.store_backend, tenant = %config.tenant_id, "Signalbox starting");

    let state = build_app_state(&config).await?;
    let app = build_router(Arc::clone(&state));

    // Bind and serve.
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Signalbox server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Signalbox server stopped");
    Ok(())
}

/// Build the shared application state.
async fn build_app_state(config: &ServerConfig) -> anyhow::Result<Arc<AppState>> {
    let store: Arc<dyn SettingsStore>;
    let directory: Arc<dyn UserDirectory>;

    match &config.store_backend {
        StoreBackendType::Memory => {
            info!("using in-memory settings (records will not persist)");
            store = Arc::new(MemorySettingsStore::new());
            directory = Arc::new(build_dev_directory(config));
        }
        #[cfg(feature = "postgres-backend")]
        StoreBackendType::Postgres { url } => {
            info!("using PostgreSQL settings");
            let pool = sqlx::PgPool::connect(url)
                .await
                .context("failed to connect to PostgreSQL")?;
            store = Arc::new(signalbox_store::PostgresSettingsStore::from_pool(
                pool.clone(),
            ));
            directory = Arc::new(signalbox_server::auth::PgDirectory::new(pool));
        }
        #[cfg(not(feature = "postgres-backend"))]
        StoreBackendType::Postgres { .. } => {
            anyhow::bail!(
                "PostgreSQL backend requested but feature 'postgres-backend' is not enabled"
            );
        }
    }

    Ok(Arc::new(AppState {
        config: config.clone(),
        store,
        directory,
    }))
}

/// Directory used with the memory backend: empty unless a dev admin email
/// is configured, in which case that user gets the master role.
fn build_dev_directory(config: &ServerConfig) -> StaticDirectory {
    let Some(ref email) = config.dev_admin_email else {
        warn!("no SIGNALBOX_DEV_ADMIN_EMAIL set, admin API will reject every caller");
        return StaticDirectory::new();
    };

    info!(admin = %email, "seeding development master admin");
    StaticDirectory::new().with_user(DirectoryUser {
        email: email.clone(),
        role: Role::Master,
        company_id: None,
    })
}

/// Build the Axum router with all routes and middleware.
fn build_router(state: Arc<AppState>) -> Router {
    // Admin routes go through the auth middleware layer, concurrency-limited
    // since every request costs a directory lookup.
    let admin_routes = Router::new()
        .nest("/v1/admin", routes::admin::router())
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            admin_auth_middleware,
        ))
        .layer(tower::limit::ConcurrencyLimitLayer::new(10));

    let cors = CorsLayer::new()
        .allow_origin(match state.config.allowed_origin.as_deref() {
            Some(origin) => match origin.parse::<HeaderValue>() {
                Ok(value) => AllowOrigin::exact(value),
                Err(_) => {
                    warn!(origin, "unparseable SIGNALBOX_ALLOWED_ORIGIN, allowing any");
                    AllowOrigin::any()
                }
            },
            None => AllowOrigin::any(),
        })
        .allow_methods([axum::http::Method::GET, axum::http::Method::PUT])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ]);

    Router::new()
        .merge(routes::health::router())
        .nest("/v1/pages", routes::pages::router())
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
