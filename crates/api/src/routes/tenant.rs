//! Tenant-scoped endpoints
//!
//! Mounted behind `resolve_tenant`; every handler receives the resolved
//! context explicitly.

use axum::{
    extract::{Path, Query},
    http::header,
    response::IntoResponse,
    Json,
};
use campfire_shared::{Plan, TenantId, TenantStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::tenancy::{gate, IdentifierKind, RejectReason, TenantContext, ThemeDescriptor};

/// What a client needs to verify which tenant it is talking to
#[derive(Debug, Serialize)]
pub struct TenantSummary {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub plan: Plan,
    pub status: TenantStatus,
    pub resolved_via: IdentifierKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_bypass: Option<RejectReason>,
    pub features: BTreeMap<String, bool>,
    pub limits: BTreeMap<String, u64>,
}

/// Get the resolved tenant
pub async fn get_tenant(ctx: TenantContext) -> Json<TenantSummary> {
    let tenant = ctx.tenant();
    Json(TenantSummary {
        id: tenant.id,
        name: tenant.name.clone(),
        slug: tenant.slug.clone(),
        plan: tenant.plan,
        status: tenant.status,
        resolved_via: ctx.resolved_via(),
        admin_bypass: ctx.admin_bypass(),
        features: ctx.features().clone(),
        limits: ctx.limits().clone(),
    })
}

/// Get the tenant's theme tokens
pub async fn get_theme(ctx: TenantContext) -> Json<ThemeDescriptor> {
    Json(ctx.theme().clone())
}

/// Get the tenant's theme as a stylesheet
pub async fn get_theme_css(ctx: TenantContext) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        ctx.theme().css_variables(),
    )
}

#[derive(Debug, Serialize)]
pub struct FeatureResponse {
    pub feature: String,
    pub enabled: bool,
}

/// Check whether a feature is enabled
pub async fn get_feature(ctx: TenantContext, Path(name): Path<String>) -> Json<FeatureResponse> {
    Json(FeatureResponse {
        enabled: gate::has_feature(&ctx, &name),
        feature: name,
    })
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub usage: u64,
}

#[derive(Debug, Serialize)]
pub struct LimitResponse {
    pub limit: String,
    /// None when the quota is unbounded
    pub ceiling: Option<u64>,
    pub usage: u64,
    pub within_limit: bool,
}

/// Check usage against a quota
pub async fn get_limit(
    ctx: TenantContext,
    Path(name): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Json<LimitResponse> {
    Json(LimitResponse {
        ceiling: ctx.limits().get(&name).copied(),
        usage: query.usage,
        within_limit: gate::is_within_limit(&ctx, &name, query.usage),
        limit: name,
    })
}
