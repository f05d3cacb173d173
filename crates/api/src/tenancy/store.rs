//! Tenant storage boundary
//!
//! Point lookups by alias kind. Implementations must never return more than
//! one tenant for a key; when storage holds duplicates the lookup fails with
//! `CampfireError::AmbiguousAlias` instead of picking one.

use async_trait::async_trait;
use campfire_shared::{CampfireError, CampfireResult, Tenant, TenantId, TenantRow};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::RwLock;

/// Storage capability injected into the tenant directory
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Look up a tenant by its subdomain label
    async fn find_by_subdomain(&self, subdomain: &str) -> CampfireResult<Option<Tenant>>;

    /// Look up a tenant by its custom domain
    async fn find_by_custom_domain(&self, domain: &str) -> CampfireResult<Option<Tenant>>;

    /// Look up a tenant by primary id
    async fn find_by_id(&self, id: TenantId) -> CampfireResult<Option<Tenant>>;

    /// Look up a tenant by slug
    async fn find_by_slug(&self, slug: &str) -> CampfireResult<Option<Tenant>>;

    /// Check that storage is reachable
    async fn health_check(&self) -> CampfireResult<()>;
}

// =============================================================================
// PostgreSQL
// =============================================================================

const TENANT_COLUMNS: &str = "id, name, slug, subdomain, custom_domain, status, plan, settings, \
     trial_ends_at, subscription_status, created_at, updated_at";

/// Tenant store backed by the `tenants` table
#[derive(Clone)]
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch at most one tenant where `column` matches `value` case-insensitively
    async fn find_one_by(&self, column: &str, value: &str) -> CampfireResult<Option<Tenant>> {
        // Two rows are enough to detect a broken uniqueness guarantee
        let query = format!(
            "SELECT {} FROM tenants WHERE LOWER({}) = LOWER($1) LIMIT 2",
            TENANT_COLUMNS, column
        );

        let mut rows: Vec<TenantRow> = sqlx::query_as(&query)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;

        if rows.len() > 1 {
            return Err(CampfireError::AmbiguousAlias(format!("{} = {}", column, value)));
        }

        Ok(rows.pop().map(Tenant::from))
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn find_by_subdomain(&self, subdomain: &str) -> CampfireResult<Option<Tenant>> {
        self.find_one_by("subdomain", subdomain).await
    }

    async fn find_by_custom_domain(&self, domain: &str) -> CampfireResult<Option<Tenant>> {
        self.find_one_by("custom_domain", domain).await
    }

    async fn find_by_id(&self, id: TenantId) -> CampfireResult<Option<Tenant>> {
        let query = format!("SELECT {} FROM tenants WHERE id = $1", TENANT_COLUMNS);

        let row: Option<TenantRow> = sqlx::query_as(&query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Tenant::from))
    }

    async fn find_by_slug(&self, slug: &str) -> CampfireResult<Option<Tenant>> {
        self.find_one_by("slug", slug).await
    }

    async fn health_check(&self) -> CampfireResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Tenant store held in memory.
///
/// Enforces alias uniqueness on every write, so lookups can never be
/// ambiguous. Used for tests and local development.
#[derive(Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a list of tenants, failing on the first alias clash
    pub fn with_tenants(tenants: impl IntoIterator<Item = Tenant>) -> CampfireResult<Self> {
        let store = Self::new();
        for tenant in tenants {
            store.insert(tenant)?;
        }
        Ok(store)
    }

    /// Add a tenant
    pub fn insert(&self, tenant: Tenant) -> CampfireResult<()> {
        let mut tenants = self.write()?;

        if tenants.contains_key(&tenant.id) {
            return Err(CampfireError::Conflict(format!("tenant id {}", tenant.id)));
        }
        check_aliases(&tenants, &tenant)?;

        tenants.insert(tenant.id, tenant);
        Ok(())
    }

    /// Replace an existing tenant
    pub fn update(&self, tenant: Tenant) -> CampfireResult<()> {
        let mut tenants = self.write()?;

        if !tenants.contains_key(&tenant.id) {
            return Err(CampfireError::NotFound(format!("tenant {}", tenant.id)));
        }
        check_aliases(&tenants, &tenant)?;

        tenants.insert(tenant.id, tenant);
        Ok(())
    }

    /// Remove a tenant, returning it if it existed
    pub fn remove(&self, id: TenantId) -> CampfireResult<Option<Tenant>> {
        Ok(self.write()?.remove(&id))
    }

    pub fn len(&self) -> usize {
        self.tenants.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find_where(&self, matches: impl Fn(&Tenant) -> bool) -> CampfireResult<Option<Tenant>> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| CampfireError::Internal("tenant store lock poisoned".to_string()))?;

        Ok(tenants.values().find(|t| matches(t)).cloned())
    }

    fn write(&self) -> CampfireResult<std::sync::RwLockWriteGuard<'_, HashMap<TenantId, Tenant>>> {
        self.tenants
            .write()
            .map_err(|_| CampfireError::Internal("tenant store lock poisoned".to_string()))
    }
}

/// Reject `tenant` if any of its aliases is already held by another tenant
fn check_aliases(tenants: &HashMap<TenantId, Tenant>, tenant: &Tenant) -> CampfireResult<()> {
    for other in tenants.values().filter(|other| other.id != tenant.id) {
        if other.slug.eq_ignore_ascii_case(&tenant.slug) {
            return Err(CampfireError::Conflict(format!("slug {}", tenant.slug)));
        }
        if alias_clash(&other.subdomain, &tenant.subdomain) {
            return Err(CampfireError::Conflict(format!(
                "subdomain {}",
                tenant.subdomain.as_deref().unwrap_or_default()
            )));
        }
        if alias_clash(&other.custom_domain, &tenant.custom_domain) {
            return Err(CampfireError::Conflict(format!(
                "custom domain {}",
                tenant.custom_domain.as_deref().unwrap_or_default()
            )));
        }
    }
    Ok(())
}

fn alias_clash(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

fn alias_matches(alias: &Option<String>, value: &str) -> bool {
    alias
        .as_deref()
        .is_some_and(|alias| alias.eq_ignore_ascii_case(value))
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn find_by_subdomain(&self, subdomain: &str) -> CampfireResult<Option<Tenant>> {
        self.find_where(|t| alias_matches(&t.subdomain, subdomain))
    }

    async fn find_by_custom_domain(&self, domain: &str) -> CampfireResult<Option<Tenant>> {
        self.find_where(|t| alias_matches(&t.custom_domain, domain))
    }

    async fn find_by_id(&self, id: TenantId) -> CampfireResult<Option<Tenant>> {
        self.find_where(|t| t.id == id)
    }

    async fn find_by_slug(&self, slug: &str) -> CampfireResult<Option<Tenant>> {
        self.find_where(|t| t.slug.eq_ignore_ascii_case(slug))
    }

    async fn health_check(&self) -> CampfireResult<()> {
        Ok(())
    }
}
