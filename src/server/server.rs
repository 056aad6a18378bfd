use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cache::slots::CacheSlots;
use crate::config::credentials::CredentialsConfig;
use crate::config::settings::{CacheScope, CredentialsMode, ServiceConfig, SettingsConfig};
use crate::observability::metrics::get_metrics;
use crate::observability::routes::MetricsState;
use crate::server::handlers::{get_token, health, post_token};
use crate::sources::OAuth2Source;
use crate::utils::constants::{HEALTH_PATH, TOKEN_PATH};

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub token_state: TokenState,
}

/// Everything the token handlers need.
#[derive(Clone)]
pub struct TokenState {
    pub mode: CredentialsMode,
    pub slots: Arc<CacheSlots>,
    pub source: OAuth2Source,
    /// Used by the fixed-credentials variant only; resolved on every request.
    pub credentials: CredentialsConfig,
}

impl AppState {
    pub async fn new(service_config: &ServiceConfig) -> Result<Self> {
        let settings = &service_config.settings;
        let metrics = get_metrics().await;

        Ok(Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            token_state: TokenState {
                mode: settings.server.mode,
                slots: Arc::new(CacheSlots::new(&settings.cache)),
                source: OAuth2Source::from_settings(settings)?,
                credentials: service_config.credentials.clone(),
            },
        })
    }
}

/// Token route for the configured variant plus health, metrics, CORS and request tracing.
pub fn router(state: AppState, settings: &SettingsConfig) -> Router {
    let token_route = match state.token_state.mode {
        CredentialsMode::Fixed => get(get_token),
        CredentialsMode::PerRequest => post(post_token),
    };
    info!("served path: {} ({})", TOKEN_PATH, state.token_state.mode.as_str());

    Router::new()
        .route(TOKEN_PATH, token_route)
        .route(HEALTH_PATH, get(health))
        .merge(state.metrics_state.router(&settings.metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until ctrl-c.
pub async fn start(service_config: &ServiceConfig) -> Result<()> {
    let settings = &service_config.settings;
    let state = AppState::new(service_config).await?;

    match settings.server.mode {
        CredentialsMode::Fixed => {
            if let Err(e) = service_config.credentials.resolve() {
                warn!("{}; token requests will fail until they are configured", e);
            }
        }
        CredentialsMode::PerRequest if settings.cache.scope == CacheScope::Shared => {
            warn!("per-request credentials with a shared cache slot: callers sending different credentials receive the same token");
        }
        CredentialsMode::PerRequest => {}
    }

    let app = router(state, settings);

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Server is running at http://{}", listener.local_addr()?);

    let metrics = get_metrics().await;
    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    metrics.up.set(0);

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
