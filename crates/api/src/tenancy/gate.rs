//! Feature/Limit Gate
//!
//! Predicates handlers call against the resolved tenant context. Features
//! fail closed: a feature the tenant's map does not mention is off. Limits
//! fail open: a quota the map does not mention is unbounded.

use super::context::TenantContext;
use crate::error::{ApiError, ApiResult};

/// Whether the tenant has `name` enabled
pub fn has_feature(ctx: &TenantContext, name: &str) -> bool {
    ctx.features().get(name).copied().unwrap_or(false)
}

/// Whether `current_usage` is within the tenant's `limit_name` quota.
/// Usage exactly at the ceiling is still within it.
pub fn is_within_limit(ctx: &TenantContext, limit_name: &str, current_usage: u64) -> bool {
    match ctx.limits().get(limit_name) {
        Some(ceiling) => current_usage <= *ceiling,
        None => true,
    }
}

/// Handler guard: reject unless the feature is enabled
pub fn require_feature(ctx: &TenantContext, name: &str) -> ApiResult<()> {
    if has_feature(ctx, name) {
        Ok(())
    } else {
        Err(ApiError::FeatureDisabled(name.to_string()))
    }
}

/// Handler guard: reject unless usage is within the quota
pub fn require_within_limit(ctx: &TenantContext, limit_name: &str, current_usage: u64) -> ApiResult<()> {
    if is_within_limit(ctx, limit_name, current_usage) {
        Ok(())
    } else {
        Err(ApiError::QuotaExceeded(limit_name.to_string()))
    }
}
