//! Context propagation middleware
//!
//! Runs the tenant pipeline for every request it wraps: extract the
//! identifier, resolve it, check eligibility, then attach the resulting
//! `TenantContext` before any handler runs. Rejections short-circuit with a
//! distinct status and error code each.
//!
//! Responses produced under a resolved tenant echo its id and slug so
//! clients can verify which tenant answered.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::context::TenantContext;
use super::eligibility::{evaluate, Eligibility};
use super::identifier::{RequestMetadata, TenantIdentifier};
use crate::auth::is_platform_admin;
use crate::error::ApiError;
use crate::state::AppState;

/// Response header echoing the resolved tenant's id
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Response header echoing the resolved tenant's slug
pub const TENANT_SLUG_HEADER: &str = "x-tenant-slug";

/// Resolve the request's tenant and attach it as a `TenantContext`
pub async fn resolve_tenant(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let admin = is_platform_admin(&request);
    let identifier = identify(&state, &request, admin)?;

    let snapshot = match state.directory.resolve(&identifier).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            info!(identifier = %identifier, error = %e, "Tenant resolution rejected request");
            return Err(e.into());
        }
    };

    // Evaluated against the clock now, not when the snapshot was cached
    let admin_bypass = match evaluate(&snapshot.tenant, OffsetDateTime::now_utc()) {
        Eligibility::Allow => None,
        Eligibility::Reject(reason) if admin => {
            info!(
                tenant_id = %snapshot.tenant.id,
                reason = %reason,
                "Platform admin bypassing tenant eligibility"
            );
            Some(reason)
        }
        Eligibility::Reject(reason) => {
            info!(
                tenant_id = %snapshot.tenant.id,
                slug = %snapshot.tenant.slug,
                reason = %reason,
                "Tenant not eligible to be served"
            );
            return Err(reason.into());
        }
    };

    let ctx = TenantContext::new(snapshot, identifier.kind(), admin_bypass);
    let echo = echo_headers(&ctx);
    debug!(tenant_id = %ctx.tenant_id(), via = ?ctx.resolved_via(), "Tenant context attached");

    request.extensions_mut().insert(ctx);
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    for (name, value) in echo {
        headers.insert(name, value);
    }

    Ok(response)
}

fn identify(state: &AppState, request: &Request, admin: bool) -> Result<TenantIdentifier, ApiError> {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host());

    // Lossy so that non-UTF-8 bytes surface as a malformed override
    let override_header = request
        .headers()
        .get(state.override_header.as_str())
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    let override_query = request
        .uri()
        .query()
        .and_then(|query| query_param(query, &state.override_query));

    let meta = RequestMetadata {
        host,
        override_header: override_header.as_deref(),
        override_query: override_query.as_deref(),
        caller_is_platform_admin: admin,
    };

    state.extractor.extract(&meta).map_err(|e| {
        warn!(error = %e, "Rejecting malformed tenant override");
        ApiError::from(e)
    })
}

fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn echo_headers(ctx: &TenantContext) -> Vec<(&'static str, HeaderValue)> {
    let mut echo = Vec::with_capacity(2);

    match HeaderValue::from_str(&ctx.tenant_id().to_string()) {
        Ok(value) => echo.push((TENANT_ID_HEADER, value)),
        Err(_) => warn!(tenant_id = %ctx.tenant_id(), "Tenant id is not a valid header value"),
    }
    match HeaderValue::from_str(ctx.slug()) {
        Ok(value) => echo.push((TENANT_SLUG_HEADER, value)),
        Err(_) => warn!(tenant_id = %ctx.tenant_id(), "Tenant slug is not a valid header value"),
    }

    echo
}
