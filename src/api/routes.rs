//! Router assembly, shared state and the server loop.

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::Gatekeeper;
use crate::config::Config;
use crate::dispatch::{CallPolicy, Dispatcher, ProviderSet};
use crate::ratelimit::RateLimiter;
use crate::registry::ModelCache;
use crate::routing::RoutingEngine;
use crate::store::{SharedStore, SupabaseStore};
use crate::usage::UsageRecorder;

use super::auth;
use super::chat;
use super::debug;
use super::models;
use super::types::StatusReply;
use super::usage;

/// Shared application state.
pub struct AppState {
    pub store: SharedStore,
    pub engine: RoutingEngine,
    pub dispatcher: Dispatcher,
    pub gatekeeper: Gatekeeper,
    pub recorder: UsageRecorder,
    /// Enables the admin routes when set.
    pub admin_key: Option<String>,
    /// Single allowed CORS origin; any origin when unset.
    pub cors_origin: Option<String>,
}

impl AppState {
    pub fn new(
        store: SharedStore,
        providers: ProviderSet,
        policy: CallPolicy,
        limiter: RateLimiter,
    ) -> Self {
        let cache = Arc::new(ModelCache::new(Arc::clone(&store)));
        Self {
            engine: RoutingEngine::new(cache),
            dispatcher: Dispatcher::new(providers, policy),
            gatekeeper: Gatekeeper::new(Arc::clone(&store), limiter),
            recorder: UsageRecorder::new(Arc::clone(&store)),
            store,
            admin_key: None,
            cors_origin: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let store: SharedStore = Arc::new(SupabaseStore::new(
            &config.supabase_url,
            &config.supabase_service_key,
        ));
        let mut state = Self::new(
            store,
            ProviderSet::from_config(config),
            CallPolicy::from_config(config),
            RateLimiter::from_config(config),
        );
        state.admin_key = config.admin_key.clone();
        state.cors_origin = config.cors_origin.clone();
        state
    }
}

/// Build the full HTTP surface for `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let protected_routes = Router::new()
        .route("/v1/chat", post(chat::chat))
        .route("/v1/agent-step", post(chat::agent_step))
        .route("/v1/router/debug", post(debug::debug_routing))
        .route("/v1/models", get(models::list_models))
        .route("/v1/usage", get(usage::get_usage))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    let mut app = Router::new().merge(public_routes).merge(protected_routes);

    if state.admin_key.is_some() {
        let admin_routes = Router::new()
            .route("/v1/admin/models/invalidate", post(models::invalidate_models))
            .route_layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                auth::require_admin,
            ));
        app = app.merge(admin_routes);
    }

    app.layer(middleware::from_fn(auth::assign_request_id))
        .layer(cors_layer(state.cors_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };
    match HeaderValue::from_str(origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            tracing::warn!("CORS_ORIGIN is not a valid header value, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(&config));

    let limiter = state.gatekeeper.limiter();
    if limiter.is_enabled() {
        limiter.spawn_janitor();
    }
    tracing::info!(
        providers = ?state.dispatcher.providers().configured(),
        rate_limit = limiter.is_enabled(),
        distributed_rate_limit = limiter.is_distributed(),
        admin = state.admin_key.is_some(),
        "Gateway configured"
    );

    let app = build_router(Arc::clone(&state));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM. In-flight requests are drained by axum.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}

/// Liveness check.
async fn health() -> Json<StatusReply> {
    Json(StatusReply { status: "ok" })
}

/// Readiness check.
async fn ready() -> Json<StatusReply> {
    Json(StatusReply { status: "ready" })
}
