//! HTTP API for the cart engine.
//!
//! Exposes the action-dispatched cart endpoint, the sign-in merge hook and
//! combo management, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use cart_store::CartStore;
use engine::{
    CartClient, CartGateway, IdentityResolver, MergeOrchestrator, SessionContext,
    StaticTokenVerifier,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::{Config, GuestCookieConfig};
use error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: CartStore> {
    pub client: CartClient<CartGateway<S>>,
    pub merger: MergeOrchestrator<CartGateway<S>>,
    pub resolver: IdentityResolver,
    pub guest_cookie: GuestCookieConfig,
}

impl<S: CartStore> AppState<S> {
    /// Resolves the acting identity of a request.
    pub async fn session(&self, headers: &HeaderMap) -> Result<SessionContext, ApiError> {
        let credentials = session::credentials(headers, &self.guest_cookie);
        Ok(self.resolver.resolve(&credentials).await?)
    }
}

/// Creates the application state over a cart store.
pub fn create_state<S: CartStore + Clone + 'static>(store: S, config: &Config) -> Arc<AppState<S>> {
    let gateway = CartGateway::new(store);
    let verifier = StaticTokenVerifier::new(config.auth_tokens.clone());

    Arc::new(AppState {
        client: CartClient::new(gateway.clone(), config.retry),
        merger: MergeOrchestrator::new(gateway, config.merge),
        resolver: IdentityResolver::new(Arc::new(verifier), config.resolver_settings()),
        guest_cookie: config.guest_cookie.clone(),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: CartStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route("/cart", post(routes::cart::dispatch::<S>))
        .route("/session/guest", post(routes::session::start_guest::<S>))
        .route("/session/merge", post(routes::session::merge::<S>))
        .route("/combos", post(routes::combos::create::<S>))
        .route(
            "/combos/{id}/availability",
            get(routes::combos::availability::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
