//! API routes

pub mod admin;
pub mod health;
pub mod tenant;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::{authenticate, require_platform_admin};
use crate::state::AppState;
use crate::tenancy::resolve_tenant;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Tenant-scoped routes; the tenant is resolved before any handler runs
    let tenant_routes = Router::new()
        .route("/tenant", get(tenant::get_tenant))
        .route("/tenant/theme", get(tenant::get_theme))
        .route("/tenant/theme.css", get(tenant::get_theme_css))
        .route("/tenant/features/:name", get(tenant::get_feature))
        .route("/tenant/limits/:name", get(tenant::get_limit))
        .route_layer(middleware::from_fn_with_state(state.clone(), resolve_tenant));

    // Platform admin routes (no tenant context)
    let admin_routes = Router::new()
        .route("/tenants/:id/invalidate", post(admin::invalidate_tenant))
        .route("/cache/stats", get(admin::cache_stats))
        .route_layer(middleware::from_fn(require_platform_admin));

    // Combine all routes
    Router::new()
        .merge(health_routes)
        .nest("/api", tenant_routes)
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
