//! Common types used across Campfire

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Tenant ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Well-known feature and limit names
// =============================================================================

/// Feature flag names understood by the platform
pub mod features {
    pub const DONATIONS: &str = "donations";
    pub const RECURRING_DONATIONS: &str = "recurring_donations";
    pub const EVENTS: &str = "events";
    pub const APPLICATIONS: &str = "applications";
    pub const MEMBER_DIRECTORY: &str = "member_directory";
    pub const CUSTOM_DOMAIN: &str = "custom_domain";
    pub const CUSTOM_CSS: &str = "custom_css";
    pub const ADVANCED_ANALYTICS: &str = "advanced_analytics";
    pub const API_ACCESS: &str = "api_access";
}

/// Quota names understood by the platform
pub mod limits {
    pub const MEMBERS: &str = "members";
    pub const ADMINS: &str = "admins";
    pub const EVENTS_PER_MONTH: &str = "events_per_month";
    pub const CAMPAIGNS: &str = "campaigns";
    pub const STORAGE_MB: &str = "storage_mb";
}

// =============================================================================
// Enums
// =============================================================================

/// Billing plan of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// No subscription required
    #[default]
    Free,
    Starter,
    Professional,
    Enterprise,
    /// Negotiated plan; features and limits come only from tenant settings
    Custom,
}

impl Plan {
    /// Whether this plan is served without a subscription or trial
    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }

    /// Parse a plan from its stored form.
    /// Unknown values decode to `Custom` so billing is still enforced.
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or(Self::Custom)
    }

    /// Features enabled by default on this plan
    pub fn default_features(&self) -> BTreeMap<String, bool> {
        let enabled: &[&str] = match self {
            Self::Free => &[features::DONATIONS, features::EVENTS],
            Self::Starter => &[
                features::DONATIONS,
                features::EVENTS,
                features::APPLICATIONS,
                features::MEMBER_DIRECTORY,
            ],
            Self::Professional => &[
                features::DONATIONS,
                features::RECURRING_DONATIONS,
                features::EVENTS,
                features::APPLICATIONS,
                features::MEMBER_DIRECTORY,
                features::CUSTOM_DOMAIN,
                features::CUSTOM_CSS,
            ],
            Self::Enterprise => &[
                features::DONATIONS,
                features::RECURRING_DONATIONS,
                features::EVENTS,
                features::APPLICATIONS,
                features::MEMBER_DIRECTORY,
                features::CUSTOM_DOMAIN,
                features::CUSTOM_CSS,
                features::ADVANCED_ANALYTICS,
                features::API_ACCESS,
            ],
            Self::Custom => &[],
        };

        enabled.iter().map(|name| (name.to_string(), true)).collect()
    }

    /// Default quota ceilings for this plan. Absent quotas are unbounded.
    pub fn default_limits(&self) -> BTreeMap<String, u64> {
        let ceilings: &[(&str, u64)] = match self {
            Self::Free => &[
                (limits::MEMBERS, 50),
                (limits::ADMINS, 1),
                (limits::EVENTS_PER_MONTH, 2),
                (limits::CAMPAIGNS, 1),
                (limits::STORAGE_MB, 100),
            ],
            Self::Starter => &[
                (limits::MEMBERS, 250),
                (limits::ADMINS, 3),
                (limits::EVENTS_PER_MONTH, 10),
                (limits::CAMPAIGNS, 5),
                (limits::STORAGE_MB, 1_024),
            ],
            Self::Professional => &[
                (limits::MEMBERS, 2_500),
                (limits::ADMINS, 10),
                (limits::EVENTS_PER_MONTH, 50),
                (limits::CAMPAIGNS, 25),
                (limits::STORAGE_MB, 10_240),
            ],
            // Enterprise keeps only a storage ceiling; everything else is unbounded
            Self::Enterprise => &[(limits::STORAGE_MB, 102_400)],
            Self::Custom => &[],
        };

        ceilings
            .iter()
            .map(|(name, ceiling)| (name.to_string(), *ceiling))
            .collect()
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Starter => write!(f, "starter"),
            Self::Professional => write!(f, "professional"),
            Self::Enterprise => write!(f, "enterprise"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "starter" => Ok(Self::Starter),
            "professional" => Ok(Self::Professional),
            "enterprise" => Ok(Self::Enterprise),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("Invalid plan: {}", s)),
        }
    }
}

/// Lifecycle status of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl TenantStatus {
    /// Only active tenants may serve non-administrative traffic
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Parse a status from its stored form; unknown values are `Inactive`
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "active" => Self::Active,
            "suspended" => Self::Suspended,
            _ => Self::Inactive,
        }
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

/// Subscription status reported by the billing provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
    /// No subscription, or a status the platform does not recognise
    #[default]
    Inactive,
}

impl SubscriptionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Parse a stored status. NULL and unknown values are `Inactive` so that
    /// every tenant has a resolvable billing state.
    pub fn from_db(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("active") => Self::Active,
            Some("trialing") => Self::Trialing,
            Some("past_due") => Self::PastDue,
            Some("canceled") | Some("cancelled") => Self::Canceled,
            Some("unpaid") => Self::Unpaid,
            Some("incomplete") => Self::Incomplete,
            _ => Self::Inactive,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Trialing => write!(f, "trialing"),
            Self::PastDue => write!(f, "past_due"),
            Self::Canceled => write!(f, "canceled"),
            Self::Unpaid => write!(f, "unpaid"),
            Self::Incomplete => write!(f, "incomplete"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Branding settings as stored by the tenant's administrators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Branding {
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub accent_color: Option<String>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub logo_url: Option<String>,
    pub heading_font: Option<String>,
    pub body_font: Option<String>,
    pub custom_css: Option<String>,
}

/// Tenant-scoped settings (stored as JSONB)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TenantSettings {
    pub branding: Branding,
    /// Feature name -> enabled; overrides the plan defaults
    pub features: BTreeMap<String, bool>,
    /// Quota name -> ceiling; overrides the plan defaults
    pub limits: BTreeMap<String, u64>,
}

// =============================================================================
// Tenant
// =============================================================================

/// Tenant (organization/camp) model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Human-readable slug, unique across tenants
    pub slug: String,
    /// Subdomain label under the platform root domain
    pub subdomain: Option<String>,
    /// Fully-qualified custom domain
    pub custom_domain: Option<String>,
    pub status: TenantStatus,
    pub plan: Plan,
    pub settings: TenantSettings,
    #[serde(with = "time::serde::rfc3339::option")]
    pub trial_ends_at: Option<OffsetDateTime>,
    pub subscription_status: SubscriptionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Tenant {
    /// Create an active tenant on the given plan, addressed by `slug` as its
    /// subdomain label.
    pub fn new(name: &str, slug: &str, plan: Plan) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: TenantId::new(),
            name: name.to_string(),
            slug: slug.to_lowercase(),
            subdomain: Some(slug.to_lowercase()),
            custom_domain: None,
            status: TenantStatus::Active,
            plan,
            settings: TenantSettings::default(),
            trial_ends_at: None,
            subscription_status: SubscriptionStatus::Inactive,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_custom_domain(mut self, domain: &str) -> Self {
        self.custom_domain = Some(domain.to_lowercase());
        self
    }

    pub fn with_status(mut self, status: TenantStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_subscription(mut self, status: SubscriptionStatus) -> Self {
        self.subscription_status = status;
        self
    }

    pub fn with_trial_end(mut self, trial_ends_at: Option<OffsetDateTime>) -> Self {
        self.trial_ends_at = trial_ends_at;
        self
    }

    pub fn with_settings(mut self, settings: TenantSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Plan defaults overlaid with the tenant's own feature flags
    pub fn effective_features(&self) -> BTreeMap<String, bool> {
        let mut merged = self.plan.default_features();
        merged.extend(
            self.settings
                .features
                .iter()
                .map(|(name, enabled)| (name.clone(), *enabled)),
        );
        merged
    }

    /// Plan defaults overlaid with the tenant's own quota ceilings
    pub fn effective_limits(&self) -> BTreeMap<String, u64> {
        let mut merged = self.plan.default_limits();
        merged.extend(
            self.settings
                .limits
                .iter()
                .map(|(name, ceiling)| (name.clone(), *ceiling)),
        );
        merged
    }
}

/// Database row for a tenant.
/// Enum columns are TEXT so that unexpected values decode lossily instead of
/// failing the whole lookup.
#[derive(Debug, Clone, FromRow)]
pub struct TenantRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub subdomain: Option<String>,
    pub custom_domain: Option<String>,
    pub status: String,
    pub plan: String,
    pub settings: serde_json::Value,
    pub trial_ends_at: Option<OffsetDateTime>,
    pub subscription_status: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Self {
            id: TenantId(row.id),
            name: row.name,
            slug: row.slug,
            subdomain: row.subdomain,
            custom_domain: row.custom_domain,
            status: TenantStatus::from_str_lossy(&row.status),
            plan: Plan::from_str_lossy(&row.plan),
            settings: serde_json::from_value(row.settings).unwrap_or_default(),
            trial_ends_at: row.trial_ends_at,
            subscription_status: SubscriptionStatus::from_db(row.subscription_status.as_deref()),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, plan: &str, settings: serde_json::Value) -> TenantRow {
        let now = OffsetDateTime::now_utc();
        TenantRow {
            id: Uuid::new_v4(),
            name: "Camp Acme".to_string(),
            slug: "acme".to_string(),
            subdomain: Some("acme".to_string()),
            custom_domain: None,
            status: status.to_string(),
            plan: plan.to_string(),
            settings,
            trial_ends_at: None,
            subscription_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_plan_parsing() {
        assert_eq!("professional".parse::<Plan>(), Ok(Plan::Professional));
        assert_eq!("FREE".parse::<Plan>(), Ok(Plan::Free));
        assert!("platinum".parse::<Plan>().is_err());
        assert_eq!(Plan::from_str_lossy("platinum"), Plan::Custom);
        assert_eq!(Plan::Enterprise.to_string(), "enterprise");
    }

    #[test]
    fn test_status_parsing_fails_closed() {
        assert_eq!(TenantStatus::from_str_lossy("active"), TenantStatus::Active);
        assert_eq!(TenantStatus::from_str_lossy("Suspended"), TenantStatus::Suspended);
        assert_eq!(TenantStatus::from_str_lossy("archived"), TenantStatus::Inactive);
        assert!(!TenantStatus::Suspended.is_active());
    }

    #[test]
    fn test_subscription_status_from_db() {
        assert_eq!(SubscriptionStatus::from_db(Some("active")), SubscriptionStatus::Active);
        assert_eq!(SubscriptionStatus::from_db(Some("past_due")), SubscriptionStatus::PastDue);
        assert_eq!(SubscriptionStatus::from_db(Some("cancelled")), SubscriptionStatus::Canceled);
        assert_eq!(SubscriptionStatus::from_db(Some("paused")), SubscriptionStatus::Inactive);
        assert_eq!(SubscriptionStatus::from_db(None), SubscriptionStatus::Inactive);
    }

    #[test]
    fn test_effective_features_overlay_plan_defaults() {
        let mut settings = TenantSettings::default();
        settings.features.insert(features::EVENTS.to_string(), false);
        settings.features.insert("beta_forms".to_string(), true);

        let tenant = Tenant::new("Camp Acme", "acme", Plan::Free).with_settings(settings);
        let effective = tenant.effective_features();

        assert_eq!(effective.get(features::DONATIONS), Some(&true));
        assert_eq!(effective.get(features::EVENTS), Some(&false));
        assert_eq!(effective.get("beta_forms"), Some(&true));
        assert!(!effective.contains_key(features::API_ACCESS));
    }

    #[test]
    fn test_effective_limits_overlay_plan_defaults() {
        let mut settings = TenantSettings::default();
        settings.limits.insert(limits::MEMBERS.to_string(), 75);

        let tenant = Tenant::new("Camp Acme", "acme", Plan::Free).with_settings(settings);
        let effective = tenant.effective_limits();

        assert_eq!(effective.get(limits::MEMBERS), Some(&75));
        assert_eq!(effective.get(limits::ADMINS), Some(&1));
    }

    #[test]
    fn test_custom_plan_has_no_defaults() {
        assert!(Plan::Custom.default_features().is_empty());
        assert!(Plan::Custom.default_limits().is_empty());
    }

    #[test]
    fn test_row_decoding() {
        let settings = serde_json::json!({
            "branding": { "primary_color": "#ff6600" },
            "features": { "custom_css": true },
            "limits": { "members": 10 }
        });
        let tenant: Tenant = row("suspended", "professional", settings).into();

        assert_eq!(tenant.status, TenantStatus::Suspended);
        assert_eq!(tenant.plan, Plan::Professional);
        assert_eq!(tenant.subscription_status, SubscriptionStatus::Inactive);
        assert_eq!(
            tenant.settings.branding.primary_color.as_deref(),
            Some("#ff6600")
        );
        assert_eq!(tenant.settings.limits.get("members"), Some(&10));
    }

    #[test]
    fn test_row_decoding_with_invalid_settings() {
        let tenant: Tenant = row("active", "free", serde_json::json!("not an object")).into();
        assert_eq!(tenant.settings, TenantSettings::default());
    }
}
