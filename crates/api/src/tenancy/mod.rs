//! Tenant resolution and isolation
//!
//! Pipeline run for every tenant-scoped request:
//! identifier extraction -> directory lookup -> eligibility -> context
//! propagation. Handlers then consult the gate and theme through the
//! attached `TenantContext`.

mod cache;
mod context;
mod directory;
mod eligibility;
pub mod gate;
mod identifier;
mod invalidation;
mod middleware;
mod store;
mod theme;

pub use cache::{CacheStats, TenantCache, DEFAULT_CACHE_TTL, DEFAULT_NEGATIVE_CACHE_TTL};
pub use context::{TenantContext, TenantSnapshot};
pub use directory::{DirectoryError, DirectoryStats, TenantDirectory};
pub use eligibility::{evaluate, Eligibility, RejectReason};
pub use identifier::{
    normalize_host, IdentifierError, IdentifierExtractor, IdentifierKind, OverrideMode,
    RequestMetadata, TenantIdentifier, RESERVED_SUBDOMAINS,
};
pub use invalidation::{
    handle_payload, publish_mutation, spawn_invalidation_listener, InvalidationError,
    TenantMutationEvent, MUTATION_CHANNEL,
};
pub use middleware::{resolve_tenant, TENANT_ID_HEADER, TENANT_SLUG_HEADER};
pub use store::{InMemoryTenantStore, PgTenantStore, TenantStore};
pub use theme::ThemeDescriptor;
