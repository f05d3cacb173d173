//! Tenant identifier extraction
//!
//! Derives a tenant identifier from request transport metadata:
//! - Subdomains: acme.campfire.org -> subdomain lookup for "acme"
//! - Custom domains: give.acme-camp.org -> custom domain lookup
//! - Explicit overrides: header or query parameter naming a tenant id/slug
//!
//! This is pure string parsing; no lookups happen here.

use serde::Serialize;
use std::net::IpAddr;
use tracing::debug;

/// Subdomains that belong to the platform itself and never name a tenant
pub const RESERVED_SUBDOMAINS: &[&str] = &[
    "www",
    "api",
    "admin",
    "app",
    "dashboard",
    "console",
    "mail",
    "docs",
    "help",
    "support",
    "status",
    "blog",
    "cdn",
    "static",
    "assets",
    "media",
    "images",
];

/// Longest accepted hostname or override value
const MAX_NAME_LEN: usize = 253;

/// The identifier a request addresses its tenant by.
///
/// Each variant is its own lookup key space, so one identifier can only ever
/// match a tenant through a single alias kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TenantIdentifier {
    /// Single label under the platform root domain
    Subdomain(String),
    /// Hostname outside the platform root domain
    CustomDomain(String),
    /// Tenant id or slug supplied by a permitted override
    ExplicitOverride(String),
    /// Nothing usable; treated as "tenant not found"
    None,
}

impl TenantIdentifier {
    pub fn kind(&self) -> IdentifierKind {
        match self {
            Self::Subdomain(_) => IdentifierKind::Subdomain,
            Self::CustomDomain(_) => IdentifierKind::CustomDomain,
            Self::ExplicitOverride(_) => IdentifierKind::ExplicitOverride,
            Self::None => IdentifierKind::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl std::fmt::Display for TenantIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subdomain(v) => write!(f, "subdomain:{}", v),
            Self::CustomDomain(v) => write!(f, "custom_domain:{}", v),
            Self::ExplicitOverride(v) => write!(f, "override:{}", v),
            Self::None => write!(f, "none"),
        }
    }
}

/// Which channel identified the tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Subdomain,
    CustomDomain,
    ExplicitOverride,
    None,
}

/// Whether explicit tenant overrides are honoured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrideMode {
    /// Overrides are ignored
    #[default]
    Disabled,
    /// The override header is honoured for platform admins only
    AdminOnly,
    /// Header and query parameter overrides are honoured for everyone
    Open,
}

impl std::str::FromStr for OverrideMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "disabled" | "off" | "false" => Ok(Self::Disabled),
            "admin" | "admin_only" => Ok(Self::AdminOnly),
            "open" | "on" | "true" => Ok(Self::Open),
            _ => Err(format!("Invalid tenant override mode: {}", s)),
        }
    }
}

/// Request metadata the identifier is derived from
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata<'a> {
    pub host: Option<&'a str>,
    pub override_header: Option<&'a str>,
    pub override_query: Option<&'a str>,
    /// Supplied by the authentication layer
    pub caller_is_platform_admin: bool,
}

/// Errors that can occur during identifier extraction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("Malformed tenant identifier: {0}")]
    Malformed(String),
}

/// Extracts tenant identifiers relative to the platform root domain
#[derive(Debug, Clone)]
pub struct IdentifierExtractor {
    base_domain: String,
    base_suffix: String,
    override_mode: OverrideMode,
}

impl IdentifierExtractor {
    pub fn new(base_domain: &str, override_mode: OverrideMode) -> Self {
        let base_domain = base_domain.trim().trim_end_matches('.').to_ascii_lowercase();
        Self {
            base_suffix: format!(".{}", base_domain),
            base_domain,
            override_mode,
        }
    }

    /// Derive the tenant identifier for a request.
    ///
    /// A permitted override wins over the host. Overrides that the current
    /// mode does not permit are ignored and the host is used instead.
    pub fn extract(&self, meta: &RequestMetadata<'_>) -> Result<TenantIdentifier, IdentifierError> {
        if let Some(value) = self.permitted_override(meta) {
            return parse_override(value).map(TenantIdentifier::ExplicitOverride);
        }

        Ok(meta
            .host
            .map(|host| self.identify_host(host))
            .unwrap_or(TenantIdentifier::None))
    }

    /// Classify a hostname against the platform root domain
    pub fn identify_host(&self, host: &str) -> TenantIdentifier {
        let Some(host) = normalize_host(host) else {
            return TenantIdentifier::None;
        };

        if host == self.base_domain {
            return TenantIdentifier::None;
        }

        match host.strip_suffix(&self.base_suffix) {
            // Only a single label directly under the root names a tenant
            Some(label) if label.contains('.') => TenantIdentifier::None,
            Some(label) if RESERVED_SUBDOMAINS.contains(&label) => TenantIdentifier::None,
            Some(label) => TenantIdentifier::Subdomain(label.to_string()),
            None => TenantIdentifier::CustomDomain(host),
        }
    }

    fn permitted_override<'a>(&self, meta: &RequestMetadata<'a>) -> Option<&'a str> {
        let requested = meta.override_header.is_some() || meta.override_query.is_some();

        let permitted = match self.override_mode {
            OverrideMode::Disabled => None,
            OverrideMode::AdminOnly if meta.caller_is_platform_admin => meta.override_header,
            OverrideMode::AdminOnly => None,
            OverrideMode::Open => meta.override_header.or(meta.override_query),
        };

        if requested && permitted.is_none() {
            debug!(
                mode = ?self.override_mode,
                "Ignoring tenant override not permitted for this caller"
            );
        }

        permitted
    }
}

/// Normalize a host header value.
///
/// Strips the port and trailing dot and lowercases. Returns `None` for empty
/// values, IP literals and anything that is not a valid DNS name.
pub fn normalize_host(host: &str) -> Option<String> {
    let host = host.trim();

    // Bracketed IPv6 literal
    if host.starts_with('[') {
        return None;
    }

    let host = host.split(':').next().unwrap_or(host);
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    if host.is_empty() || host.len() > MAX_NAME_LEN || host.parse::<IpAddr>().is_ok() {
        return None;
    }

    if !host.split('.').all(is_valid_label) {
        return None;
    }

    Some(host)
}

/// Check a single DNS label (letters, digits, inner hyphens)
fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Validate an explicit override value (tenant UUID or slug)
fn parse_override(value: &str) -> Result<String, IdentifierError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(IdentifierError::Malformed("empty tenant override".to_string()));
    }

    if value.len() > MAX_NAME_LEN {
        return Err(IdentifierError::Malformed("tenant override too long".to_string()));
    }

    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(IdentifierError::Malformed(
            "tenant override may only contain letters, digits and hyphens".to_string(),
        ));
    }

    Ok(value.to_ascii_lowercase())
}
