//! API error types and handling

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::tenancy::{DirectoryError, IdentifierError, RejectReason};

/// Seconds a client should wait before retrying an unavailable directory
pub const DIRECTORY_RETRY_AFTER_SECS: u64 = 5;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Tenant resolution
    #[error("Tenant not found")]
    TenantNotFound,
    #[error("Tenant is not active")]
    TenantInactive,
    #[error("Payment required")]
    PaymentRequired,
    #[error("Tenant directory is temporarily unavailable")]
    DirectoryUnavailable,
    #[error("Malformed tenant identifier: {0}")]
    MalformedIdentifier(String),

    // Feature and limit gates
    #[error("Feature not enabled for this tenant: {0}")]
    FeatureDisabled(String),
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    // Authorization
    #[error("Authentication required")]
    Unauthorized,
    #[error("Insufficient permissions")]
    Forbidden,

    // Internal errors
    #[error("Tenant context missing")]
    TenantContextMissing,
}

impl ApiError {
    /// Status, machine-readable code and human message for this error
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            // Tenant resolution
            ApiError::TenantNotFound => (StatusCode::NOT_FOUND, "TENANT_NOT_FOUND", self.to_string()),
            ApiError::TenantInactive => (StatusCode::FORBIDDEN, "TENANT_INACTIVE", self.to_string()),
            ApiError::PaymentRequired => (
                StatusCode::PAYMENT_REQUIRED,
                "PAYMENT_REQUIRED",
                "This organization's trial has ended and its subscription is inactive".to_string(),
            ),
            ApiError::DirectoryUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DIRECTORY_UNAVAILABLE",
                self.to_string(),
            ),
            ApiError::MalformedIdentifier(_) => (
                StatusCode::BAD_REQUEST,
                "MALFORMED_TENANT_IDENTIFIER",
                self.to_string(),
            ),

            // Gates
            ApiError::FeatureDisabled(_) => (StatusCode::FORBIDDEN, "FEATURE_DISABLED", self.to_string()),
            ApiError::QuotaExceeded(_) => (StatusCode::PAYMENT_REQUIRED, "QUOTA_EXCEEDED", self.to_string()),

            // Authorization
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),

            // Internal
            ApiError::TenantContextMissing => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TENANT_CONTEXT_MISSING",
                self.to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        let mut response = (status, body).into_response();
        if matches!(self, ApiError::DirectoryUnavailable) {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(DIRECTORY_RETRY_AFTER_SECS),
            );
        }
        response
    }
}

impl From<IdentifierError> for ApiError {
    fn from(err: IdentifierError) -> Self {
        match err {
            IdentifierError::Malformed(detail) => ApiError::MalformedIdentifier(detail),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(_) => ApiError::TenantNotFound,
            // Detail was logged where it happened and is never rendered
            DirectoryError::Unavailable(_) => ApiError::DirectoryUnavailable,
        }
    }
}

impl From<RejectReason> for ApiError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::Inactive => ApiError::TenantInactive,
            RejectReason::PaymentRequired => ApiError::PaymentRequired,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
