//! HTTP API: shared state and router composition.

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};
use sqlx::MySqlPool;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::config::Config;
use crate::services::token_service::TokenService;

pub mod handlers;
pub mod middleware;
pub mod validation;

/// Shared application state available to every handler.
pub struct AppState {
    pub db: MySqlPool,
    pub config: Config,
    pub tokens: TokenService,
}

pub type SharedState = Arc<AppState>;

/// Build the full application router.
pub fn router(state: SharedState) -> Router {
    // Everything except login, refresh and the health probes sits behind the
    // bearer-token middleware. Admin-only operations check the role in the
    // handler.
    let protected = Router::new()
        .nest("/api/v1/auth", handlers::auth::protected_router())
        .nest("/api/v1/users", handlers::users::router())
        .nest("/api/v1/radius/users", handlers::radius_users::router())
        .nest("/api/v1/radius/groups", handlers::radius_groups::router())
        .nest("/api/v1/radius/sessions", handlers::sessions::router())
        .nest(
            "/api/v1/radius/auth-log",
            handlers::sessions::auth_log_router(),
        )
        .nest("/api/v1/radius/coa", handlers::coa::router())
        .nest(
            "/api/v1/radius/policy-templates",
            handlers::coa::templates_router(),
        )
        .nest("/api/v1/audit-logs", handlers::audit::router())
        .nest("/api/v1/dashboard", handlers::dashboard::router())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .nest("/health", handlers::health::router())
        .nest("/api/v1/auth", handlers::auth::public_router())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}
