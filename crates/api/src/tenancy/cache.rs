//! In-memory tenant cache with TTL
//!
//! Caches identifier-to-tenant lookups so the directory does not hit storage
//! on every request. Not-found results are cached too, with a shorter TTL.
//!
//! Every invalidation bumps a generation counter. A lookup that started
//! before an invalidation cannot write its (possibly stale) result back.

use campfire_shared::TenantId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::context::TenantSnapshot;
use super::identifier::TenantIdentifier;

/// Default TTL for resolved tenants (5 minutes)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default TTL for identifiers that matched no tenant
pub const DEFAULT_NEGATIVE_CACHE_TTL: Duration = Duration::from_secs(30);

/// Cache entry with expiration
#[derive(Clone)]
struct CacheEntry {
    snapshot: Option<Arc<TenantSnapshot>>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(snapshot: Option<Arc<TenantSnapshot>>, ttl: Duration) -> Self {
        Self {
            snapshot,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }

    fn tenant_id(&self) -> Option<TenantId> {
        self.snapshot.as_ref().map(|s| s.tenant.id)
    }
}

/// Thread-safe in-memory tenant cache
pub struct TenantCache {
    /// Identifier -> snapshot (None means the identifier matched no tenant)
    cache: RwLock<HashMap<TenantIdentifier, CacheEntry>>,
    generation: AtomicU64,
    ttl: Duration,
    negative_ttl: Duration,
}

impl Default for TenantCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantCache {
    /// Create a new cache with default TTLs
    pub fn new() -> Self {
        Self::with_ttls(DEFAULT_CACHE_TTL, DEFAULT_NEGATIVE_CACHE_TTL)
    }

    /// Create a new cache with custom TTLs
    pub fn with_ttls(ttl: Duration, negative_ttl: Duration) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            ttl,
            negative_ttl,
        }
    }

    /// Get a cached lookup result
    /// Returns Some(Some(snapshot)) if found and valid
    /// Returns Some(None) if the identifier was cached as not resolving
    /// Returns None if not in cache or expired
    pub fn get(&self, identifier: &TenantIdentifier) -> Option<Option<Arc<TenantSnapshot>>> {
        let cache = self.cache.read().ok()?;
        let entry = cache.get(identifier)?;

        if entry.is_expired() {
            None
        } else {
            Some(entry.snapshot.clone())
        }
    }

    /// Current invalidation generation; pass it back to `set_if_current`
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Cache a lookup result unconditionally
    pub fn set(&self, identifier: &TenantIdentifier, snapshot: Option<Arc<TenantSnapshot>>) {
        if let Ok(mut cache) = self.cache.write() {
            let ttl = self.ttl_for_result(snapshot.is_some());
            cache.insert(identifier.clone(), CacheEntry::new(snapshot, ttl));
        }
    }

    /// Cache a lookup result unless an invalidation happened since
    /// `generation` was read. Returns whether the entry was written.
    pub fn set_if_current(
        &self,
        identifier: &TenantIdentifier,
        snapshot: Option<Arc<TenantSnapshot>>,
        generation: u64,
    ) -> bool {
        let Ok(mut cache) = self.cache.write() else {
            return false;
        };

        // Invalidations bump the generation while holding the write lock
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }

        let ttl = self.ttl_for_result(snapshot.is_some());
        cache.insert(identifier.clone(), CacheEntry::new(snapshot, ttl));
        true
    }

    /// Invalidate a specific identifier
    pub fn invalidate(&self, identifier: &TenantIdentifier) {
        if let Ok(mut cache) = self.cache.write() {
            self.bump_generation();
            cache.remove(identifier);
        }
    }

    /// Invalidate every entry that resolved to a tenant.
    /// Returns the number of entries removed.
    pub fn invalidate_tenant(&self, tenant_id: TenantId) -> usize {
        if let Ok(mut cache) = self.cache.write() {
            self.bump_generation();
            let before = cache.len();
            cache.retain(|_, entry| entry.tenant_id() != Some(tenant_id));
            before - cache.len()
        } else {
            0
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            self.bump_generation();
            cache.clear();
        }
    }

    /// Clear expired entries (call periodically for memory management).
    /// Returns the number of entries removed.
    pub fn cleanup(&self) -> usize {
        if let Ok(mut cache) = self.cache.write() {
            let before = cache.len();
            cache.retain(|_, entry| !entry.is_expired());
            before - cache.len()
        } else {
            0
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        if let Ok(cache) = self.cache.read() {
            let total = cache.len();
            let expired = cache.values().filter(|e| e.is_expired()).count();
            let negative = cache
                .values()
                .filter(|e| !e.is_expired() && e.snapshot.is_none())
                .count();
            CacheStats {
                total_entries: total,
                expired_entries: expired,
                active_entries: total - expired,
                negative_entries: negative,
                generation: self.generation(),
            }
        } else {
            CacheStats::default()
        }
    }

    fn ttl_for_result(&self, found: bool) -> Duration {
        if found {
            self.ttl
        } else {
            self.negative_ttl
        }
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Cache statistics
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
    /// Unexpired entries recording that an identifier matched no tenant
    pub negative_entries: usize,
    pub generation: u64,
}
