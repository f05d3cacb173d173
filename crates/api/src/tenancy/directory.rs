//! Tenant Directory
//!
//! Resolves identifiers to tenant snapshots through the injected store,
//! with a TTL cache in front of it. Concurrent resolutions of the same
//! uncached identifier share a single storage lookup.
//!
//! The lookup runs on its own task, so a caller that goes away mid-lookup
//! does not cancel it; the result still lands in the cache for the other
//! waiters.

use campfire_shared::{CampfireError, TenantId};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::cache::{CacheStats, TenantCache};
use super::context::TenantSnapshot;
use super::identifier::TenantIdentifier;
use super::invalidation::TenantMutationEvent;
use super::store::TenantStore;

/// Directory resolution failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// No alias matched
    #[error("Tenant not found: {0}")]
    NotFound(String),

    /// Storage could not answer; never cached and never reported as not found
    #[error("Tenant directory unavailable: {0}")]
    Unavailable(String),
}

type LookupResult = Result<Option<Arc<TenantSnapshot>>, DirectoryError>;
type SharedLookup = Shared<BoxFuture<'static, LookupResult>>;

/// A storage lookup other callers can join
#[derive(Clone)]
struct InFlight {
    id: u64,
    lookup: SharedLookup,
}

type InFlightMap = HashMap<TenantIdentifier, InFlight>;

/// Tenant directory with caching and request collapsing
#[derive(Clone)]
pub struct TenantDirectory {
    store: Arc<dyn TenantStore>,
    cache: Arc<TenantCache>,
    in_flight: Arc<Mutex<InFlightMap>>,
    next_lookup_id: Arc<AtomicU64>,
}

impl TenantDirectory {
    pub fn new(store: Arc<dyn TenantStore>, cache: Arc<TenantCache>) -> Self {
        Self {
            store,
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_lookup_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Resolve an identifier to a tenant snapshot
    pub async fn resolve(
        &self,
        identifier: &TenantIdentifier,
    ) -> Result<Arc<TenantSnapshot>, DirectoryError> {
        if identifier.is_none() {
            return Err(DirectoryError::NotFound(identifier.to_string()));
        }

        if let Some(cached) = self.cache.get(identifier) {
            debug!(identifier = %identifier, found = cached.is_some(), "Tenant cache hit");
            return cached.ok_or_else(|| DirectoryError::NotFound(identifier.to_string()));
        }

        let lookup = self.join_or_start(identifier);
        match lookup.await? {
            Some(snapshot) => Ok(snapshot),
            None => Err(DirectoryError::NotFound(identifier.to_string())),
        }
    }

    /// Join the lookup already running for `identifier`, or start one
    fn join_or_start(&self, identifier: &TenantIdentifier) -> SharedLookup {
        let mut in_flight = lock(&self.in_flight);

        if let Some(existing) = in_flight.get(identifier) {
            debug!(identifier = %identifier, "Joining in-flight tenant lookup");
            return existing.lookup.clone();
        }

        // A lookup may have finished between the cache miss and taking the lock
        if let Some(cached) = self.cache.get(identifier) {
            return futures::future::ready(Ok(cached)).boxed().shared();
        }

        debug!(identifier = %identifier, "Tenant cache miss");

        let id = self.next_lookup_id.fetch_add(1, Ordering::Relaxed);
        let generation = self.cache.generation();
        let key = identifier.clone();
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        let registry = Arc::clone(&self.in_flight);

        let task = tokio::spawn(async move {
            let result = lookup(store.as_ref(), &key).await;

            if let Ok(found) = &result {
                if !cache.set_if_current(&key, found.clone(), generation) {
                    debug!(identifier = %key, "Skipping cache write after invalidation");
                }
            }

            // Cache is written first so nobody misses both the entry and the lookup
            let mut in_flight = lock(&registry);
            if in_flight.get(&key).is_some_and(|entry| entry.id == id) {
                in_flight.remove(&key);
            }

            result
        });

        let lookup = async move {
            task.await.unwrap_or_else(|e| {
                error!(error = %e, "Tenant lookup task failed");
                Err(DirectoryError::Unavailable("tenant lookup task failed".to_string()))
            })
        }
        .boxed()
        .shared();

        in_flight.insert(
            identifier.clone(),
            InFlight {
                id,
                lookup: lookup.clone(),
            },
        );

        lookup
    }

    /// Forget a single identifier
    pub fn invalidate(&self, identifier: &TenantIdentifier) {
        self.cache.invalidate(identifier);
        lock(&self.in_flight).remove(identifier);
    }

    /// Forget every cached identifier that resolved to `tenant_id`.
    ///
    /// Lookups already running keep their in-flight entries; the generation
    /// bump stops them from caching what they read.
    pub fn invalidate_tenant(&self, tenant_id: TenantId) -> usize {
        self.cache.invalidate_tenant(tenant_id)
    }

    /// Apply a tenant mutation: drop the tenant's entries and every alias the
    /// event names, including negative entries for newly claimed aliases
    pub fn apply_mutation(&self, event: &TenantMutationEvent) {
        let removed = self.invalidate_tenant(event.tenant_id);
        for identifier in event.identifiers() {
            self.invalidate(&identifier);
        }

        info!(
            tenant_id = %event.tenant_id,
            removed_entries = removed,
            "Applied tenant mutation to directory cache"
        );
    }

    /// Drop every cached entry
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    /// Remove expired cache entries
    pub fn cleanup(&self) -> usize {
        self.cache.cleanup()
    }

    pub fn stats(&self) -> DirectoryStats {
        DirectoryStats {
            cache: self.cache.stats(),
            in_flight_lookups: lock(&self.in_flight).len(),
        }
    }

    /// Get the tenant cache for statistics/management
    pub fn cache(&self) -> &TenantCache {
        &self.cache
    }

    /// Check that the underlying store is reachable
    pub async fn health_check(&self) -> Result<(), DirectoryError> {
        self.store
            .health_check()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))
    }
}

/// Directory statistics
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryStats {
    pub cache: CacheStats,
    pub in_flight_lookups: usize,
}

/// One logical lookup per alias kind
async fn lookup(store: &dyn TenantStore, identifier: &TenantIdentifier) -> LookupResult {
    let found = match identifier {
        TenantIdentifier::Subdomain(label) => store.find_by_subdomain(label).await,
        TenantIdentifier::CustomDomain(domain) => store.find_by_custom_domain(domain).await,
        TenantIdentifier::ExplicitOverride(value) => match Uuid::parse_str(value) {
            Ok(id) => store.find_by_id(TenantId(id)).await,
            Err(_) => store.find_by_slug(value).await,
        },
        TenantIdentifier::None => Ok(None),
    };

    match found {
        Ok(tenant) => Ok(tenant.map(|t| Arc::new(TenantSnapshot::from_tenant(t)))),
        Err(CampfireError::AmbiguousAlias(detail)) => {
            error!(identifier = %identifier, detail = %detail, "Alias matched more than one tenant");
            Err(DirectoryError::Unavailable(format!("ambiguous alias {}", identifier)))
        }
        Err(e) => {
            error!(identifier = %identifier, error = %e, "Tenant lookup failed");
            Err(DirectoryError::Unavailable(e.to_string()))
        }
    }
}

/// The map is only touched in short synchronous sections; a poisoned lock
/// still holds a consistent map
fn lock(in_flight: &Mutex<InFlightMap>) -> MutexGuard<'_, InFlightMap> {
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenancy::store::InMemoryTenantStore;
    use async_trait::async_trait;
    use campfire_shared::{CampfireResult, Plan, Tenant};
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    /// Store wrapper that counts lookups, delays them and can fail on demand
    struct InstrumentedStore {
        inner: InMemoryTenantStore,
        lookups: AtomicUsize,
        delay: Duration,
        down: AtomicBool,
    }

    impl InstrumentedStore {
        fn new(tenants: Vec<Tenant>, delay: Duration) -> Self {
            Self {
                inner: InMemoryTenantStore::with_tenants(tenants).unwrap(),
                lookups: AtomicUsize::new(0),
                delay,
                down: AtomicBool::new(false),
            }
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }

        async fn enter(&self) -> CampfireResult<()> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.down.load(Ordering::SeqCst) {
                return Err(CampfireError::Database("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TenantStore for InstrumentedStore {
        async fn find_by_subdomain(&self, subdomain: &str) -> CampfireResult<Option<Tenant>> {
            self.enter().await?;
            self.inner.find_by_subdomain(subdomain).await
        }

        async fn find_by_custom_domain(&self, domain: &str) -> CampfireResult<Option<Tenant>> {
            self.enter().await?;
            self.inner.find_by_custom_domain(domain).await
        }

        async fn find_by_id(&self, id: TenantId) -> CampfireResult<Option<Tenant>> {
            self.enter().await?;
            self.inner.find_by_id(id).await
        }

        async fn find_by_slug(&self, slug: &str) -> CampfireResult<Option<Tenant>> {
            self.enter().await?;
            self.inner.find_by_slug(slug).await
        }

        async fn health_check(&self) -> CampfireResult<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(CampfireError::Database("connection refused".to_string()));
            }
            Ok(())
        }
    }

    /// Store that reports an alias matching two tenants
    struct AmbiguousStore;

    #[async_trait]
    impl TenantStore for AmbiguousStore {
        async fn find_by_subdomain(&self, subdomain: &str) -> CampfireResult<Option<Tenant>> {
            Err(CampfireError::AmbiguousAlias(format!("subdomain = {}", subdomain)))
        }

        async fn find_by_custom_domain(&self, _domain: &str) -> CampfireResult<Option<Tenant>> {
            Ok(None)
        }

        async fn find_by_id(&self, _id: TenantId) -> CampfireResult<Option<Tenant>> {
            Ok(None)
        }

        async fn find_by_slug(&self, _slug: &str) -> CampfireResult<Option<Tenant>> {
            Ok(None)
        }

        async fn health_check(&self) -> CampfireResult<()> {
            Ok(())
        }
    }

    fn acme() -> Tenant {
        Tenant::new("Camp Acme", "acme", Plan::Professional).with_custom_domain("give.acme-camp.org")
    }

    fn directory(store: Arc<InstrumentedStore>) -> TenantDirectory {
        TenantDirectory::new(store, Arc::new(TenantCache::new()))
    }

    fn subdomain(label: &str) -> TenantIdentifier {
        TenantIdentifier::Subdomain(label.to_string())
    }

    #[tokio::test]
    async fn test_every_alias_resolves_to_its_tenant() {
        let tenant = acme();
        let store = Arc::new(InstrumentedStore::new(vec![tenant.clone()], Duration::ZERO));
        let dir = directory(store);

        for identifier in [
            subdomain("acme"),
            TenantIdentifier::CustomDomain("give.acme-camp.org".to_string()),
            TenantIdentifier::ExplicitOverride("acme".to_string()),
            TenantIdentifier::ExplicitOverride(tenant.id.to_string()),
        ] {
            let snapshot = dir.resolve(&identifier).await.unwrap();
            assert_eq!(snapshot.tenant.id, tenant.id, "{}", identifier);
        }
    }

    #[tokio::test]
    async fn test_alias_kinds_do_not_cross() {
        let store = Arc::new(InstrumentedStore::new(vec![acme()], Duration::ZERO));
        let dir = directory(store);

        // The slug is not a custom domain, and the custom domain is not a subdomain
        assert!(matches!(
            dir.resolve(&TenantIdentifier::CustomDomain("acme".to_string())).await,
            Err(DirectoryError::NotFound(_))
        ));
        assert!(matches!(
            dir.resolve(&subdomain("give.acme-camp.org")).await,
            Err(DirectoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_none_is_not_found_without_lookup() {
        let store = Arc::new(InstrumentedStore::new(vec![acme()], Duration::ZERO));
        let dir = directory(Arc::clone(&store));

        assert!(matches!(
            dir.resolve(&TenantIdentifier::None).await,
            Err(DirectoryError::NotFound(_))
        ));
        assert_eq!(store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_results_are_cached() {
        let store = Arc::new(InstrumentedStore::new(vec![acme()], Duration::ZERO));
        let dir = directory(Arc::clone(&store));

        dir.resolve(&subdomain("acme")).await.unwrap();
        dir.resolve(&subdomain("acme")).await.unwrap();
        assert_eq!(store.lookups(), 1);

        // Not-found is cached too
        assert!(dir.resolve(&subdomain("unknown")).await.is_err());
        assert!(dir.resolve(&subdomain("unknown")).await.is_err());
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_collapse() {
        let tenant = Tenant::new("Camp Delta", "delta", Plan::Free);
        let store = Arc::new(InstrumentedStore::new(
            vec![tenant.clone()],
            Duration::from_millis(50),
        ));
        let dir = directory(Arc::clone(&store));

        let key = subdomain("delta");
        let (a, b, c) = tokio::join!(dir.resolve(&key), dir.resolve(&key), dir.resolve(&key));

        assert_eq!(store.lookups(), 1);
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
        assert_eq!(a.tenant.id, tenant.id);
        assert_eq!(dir.stats().in_flight_lookups, 0);
    }

    #[tokio::test]
    async fn test_concurrent_not_found_collapse() {
        let store = Arc::new(InstrumentedStore::new(vec![], Duration::from_millis(30)));
        let dir = directory(Arc::clone(&store));

        let key = subdomain("ghost");
        let (a, b) = tokio::join!(dir.resolve(&key), dir.resolve(&key));

        assert_eq!(store.lookups(), 1);
        assert!(matches!(a, Err(DirectoryError::NotFound(_))));
        assert!(matches!(b, Err(DirectoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unrelated_invalidation_keeps_lookup_shared() {
        let delta = Tenant::new("Camp Delta", "delta", Plan::Free);
        let other = acme();
        let store = Arc::new(InstrumentedStore::new(
            vec![delta.clone(), other.clone()],
            Duration::from_millis(60),
        ));
        let dir = directory(Arc::clone(&store));
        let key = subdomain("delta");

        let first = tokio::spawn({
            let dir = dir.clone();
            let key = key.clone();
            async move { dir.resolve(&key).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(dir.stats().in_flight_lookups, 1);

        dir.invalidate_tenant(other.id);
        let second = dir.resolve(&key).await.unwrap();

        assert_eq!(store.lookups(), 1);
        assert_eq!(second.tenant.id, delta.id);
        assert_eq!(first.await.unwrap().unwrap().tenant.id, delta.id);
    }

    #[tokio::test]
    async fn test_invalidate_all_keeps_lookup_shared() {
        let delta = Tenant::new("Camp Delta", "delta", Plan::Free);
        let store = Arc::new(InstrumentedStore::new(vec![delta.clone()], Duration::from_millis(60)));
        let dir = directory(Arc::clone(&store));
        let key = subdomain("delta");

        let first = tokio::spawn({
            let dir = dir.clone();
            let key = key.clone();
            async move { dir.resolve(&key).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        dir.invalidate_all();
        dir.resolve(&key).await.unwrap();
        first.await.unwrap().unwrap();

        assert_eq!(store.lookups(), 1);
        assert_eq!(dir.stats().in_flight_lookups, 0);
    }

    #[tokio::test]
    async fn test_cancelled_caller_still_populates_cache() {
        let store = Arc::new(InstrumentedStore::new(vec![acme()], Duration::from_millis(40)));
        let dir = directory(Arc::clone(&store));

        let timed_out =
            tokio::time::timeout(Duration::from_millis(5), dir.resolve(&subdomain("acme"))).await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(dir.cache().get(&subdomain("acme")).is_some());

        dir.resolve(&subdomain("acme")).await.unwrap();
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_is_distinct_and_not_cached() {
        let store = Arc::new(InstrumentedStore::new(vec![acme()], Duration::ZERO));
        store.down.store(true, Ordering::SeqCst);
        let dir = directory(Arc::clone(&store));

        assert!(matches!(
            dir.resolve(&subdomain("acme")).await,
            Err(DirectoryError::Unavailable(_))
        ));
        assert!(dir.cache().get(&subdomain("acme")).is_none());
        assert!(dir.health_check().await.is_err());

        // Recovers as soon as storage does
        store.down.store(false, Ordering::SeqCst);
        assert!(dir.resolve(&subdomain("acme")).await.is_ok());
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn test_ambiguous_alias_is_unavailable() {
        let dir = TenantDirectory::new(Arc::new(AmbiguousStore), Arc::new(TenantCache::new()));
        assert!(matches!(
            dir.resolve(&subdomain("twins")).await,
            Err(DirectoryError::Unavailable(_))
        ));
        assert!(dir.cache().get(&subdomain("twins")).is_none());
    }

    #[tokio::test]
    async fn test_mutation_refreshes_status() {
        let tenant = acme();
        let store = Arc::new(InstrumentedStore::new(vec![tenant.clone()], Duration::ZERO));
        let dir = directory(Arc::clone(&store));

        let before = dir.resolve(&subdomain("acme")).await.unwrap();
        assert!(before.tenant.status.is_active());

        let suspended = tenant
            .clone()
            .with_status(campfire_shared::TenantStatus::Suspended);
        store.inner.update(suspended.clone()).unwrap();
        dir.apply_mutation(&TenantMutationEvent::for_tenant(&suspended));

        let after = dir.resolve(&subdomain("acme")).await.unwrap();
        assert!(!after.tenant.status.is_active());
    }

    #[tokio::test]
    async fn test_mutation_clears_negative_entry_for_new_alias() {
        let tenant = Tenant::new("Camp Acme", "acme", Plan::Free);
        let store = Arc::new(InstrumentedStore::new(vec![tenant.clone()], Duration::ZERO));
        let dir = directory(Arc::clone(&store));

        let domain = TenantIdentifier::CustomDomain("give.acme-camp.org".to_string());
        assert!(dir.resolve(&domain).await.is_err());

        let updated = tenant.with_custom_domain("give.acme-camp.org");
        store.inner.update(updated.clone()).unwrap();
        dir.apply_mutation(&TenantMutationEvent::for_tenant(&updated));

        assert_eq!(dir.resolve(&domain).await.unwrap().tenant.id, updated.id);
    }

    #[tokio::test]
    async fn test_invalidate_all_and_cleanup() {
        let store = Arc::new(InstrumentedStore::new(vec![acme()], Duration::ZERO));
        let dir = directory(Arc::clone(&store));

        dir.resolve(&subdomain("acme")).await.unwrap();
        assert_eq!(dir.stats().cache.active_entries, 1);

        dir.invalidate_all();
        assert_eq!(dir.stats().cache.total_entries, 0);
        assert_eq!(dir.cleanup(), 0);

        dir.resolve(&subdomain("acme")).await.unwrap();
        assert_eq!(store.lookups(), 2);
    }
}
