//! Resolved tenant context
//!
//! `TenantSnapshot` is what the directory caches: the tenant record with its
//! theme, features and limits already derived. `TenantContext` wraps a
//! snapshot for one request, after eligibility has been decided.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use campfire_shared::{Tenant, TenantId};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::eligibility::RejectReason;
use super::identifier::IdentifierKind;
use super::theme::ThemeDescriptor;
use crate::error::ApiError;

/// Tenant record plus everything derived from it
#[derive(Debug, Clone, PartialEq)]
pub struct TenantSnapshot {
    pub tenant: Tenant,
    pub theme: ThemeDescriptor,
    pub features: BTreeMap<String, bool>,
    pub limits: BTreeMap<String, u64>,
}

impl TenantSnapshot {
    pub fn from_tenant(tenant: Tenant) -> Self {
        Self {
            theme: ThemeDescriptor::project(&tenant),
            features: tenant.effective_features(),
            limits: tenant.effective_limits(),
            tenant,
        }
    }
}

/// The per-request, read-only view of the resolved tenant.
///
/// Cloning shares the snapshot; there is no way to mutate it once attached.
#[derive(Debug, Clone)]
pub struct TenantContext {
    snapshot: Arc<TenantSnapshot>,
    resolved_via: IdentifierKind,
    admin_bypass: Option<RejectReason>,
}

impl TenantContext {
    pub fn new(
        snapshot: Arc<TenantSnapshot>,
        resolved_via: IdentifierKind,
        admin_bypass: Option<RejectReason>,
    ) -> Self {
        Self {
            snapshot,
            resolved_via,
            admin_bypass,
        }
    }

    pub fn tenant(&self) -> &Tenant {
        &self.snapshot.tenant
    }

    pub fn tenant_id(&self) -> TenantId {
        self.snapshot.tenant.id
    }

    pub fn slug(&self) -> &str {
        &self.snapshot.tenant.slug
    }

    pub fn theme(&self) -> &ThemeDescriptor {
        &self.snapshot.theme
    }

    pub fn features(&self) -> &BTreeMap<String, bool> {
        &self.snapshot.features
    }

    pub fn limits(&self) -> &BTreeMap<String, u64> {
        &self.snapshot.limits
    }

    pub fn snapshot(&self) -> &Arc<TenantSnapshot> {
        &self.snapshot
    }

    /// Which channel identified the tenant
    pub fn resolved_via(&self) -> IdentifierKind {
        self.resolved_via
    }

    /// Set when a platform admin was let through to an ineligible tenant
    pub fn admin_bypass(&self) -> Option<RejectReason> {
        self.admin_bypass
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only present when the handler is mounted behind `resolve_tenant`
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or(ApiError::TenantContextMissing)
    }
}
