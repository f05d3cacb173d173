//! Platform admin endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use campfire_shared::TenantId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;
use crate::tenancy::{publish_mutation, DirectoryStats, TenantMutationEvent};

/// Aliases to drop along with the tenant's cached entries
#[derive(Debug, Default, Deserialize)]
pub struct InvalidateRequest {
    pub slug: Option<String>,
    pub subdomain: Option<String>,
    pub custom_domain: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub tenant_id: TenantId,
    /// Whether the event reached the invalidation channel
    pub published: bool,
}

/// Drop a tenant from the directory cache here and, when Redis is
/// configured, on every other instance
pub async fn invalidate_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    body: Option<Json<InvalidateRequest>>,
) -> ApiResult<Json<InvalidateResponse>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let event = TenantMutationEvent {
        tenant_id: TenantId(tenant_id),
        slug: request.slug,
        subdomain: request.subdomain,
        custom_domain: request.custom_domain,
    };

    state.directory.apply_mutation(&event);

    let published = match state.redis.clone() {
        Some(mut conn) => match publish_mutation(&mut conn, &event).await {
            Ok(_) => true,
            Err(e) => {
                // Local cache is already clean; other instances fall back to TTL
                tracing::error!(tenant_id = %event.tenant_id, error = %e, "Failed to publish tenant mutation");
                false
            }
        },
        None => false,
    };

    Ok(Json(InvalidateResponse {
        tenant_id: event.tenant_id,
        published,
    }))
}

/// Directory cache statistics
pub async fn cache_stats(State(state): State<AppState>) -> Json<DirectoryStats> {
    Json(state.directory.stats())
}
