//! Shared application state

use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::auth::digest_token;
use crate::config::Config;
use crate::tenancy::{IdentifierExtractor, TenantCache, TenantDirectory, TenantStore};

/// Default header carrying an explicit tenant override
pub const DEFAULT_OVERRIDE_HEADER: &str = "x-tenant-override";

/// Default query parameter carrying an explicit tenant override
pub const DEFAULT_OVERRIDE_QUERY: &str = "tenant";

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub extractor: IdentifierExtractor,
    pub directory: TenantDirectory,
    pub override_header: String,
    pub override_query: String,
    /// SHA-256 of the platform admin token, when one is configured
    pub admin_token_digest: Option<[u8; 32]>,
    /// Publishes tenant mutations to other instances
    pub redis: Option<ConnectionManager>,
}

impl AppState {
    pub fn new(extractor: IdentifierExtractor, directory: TenantDirectory) -> Self {
        Self {
            extractor,
            directory,
            override_header: DEFAULT_OVERRIDE_HEADER.to_string(),
            override_query: DEFAULT_OVERRIDE_QUERY.to_string(),
            admin_token_digest: None,
            redis: None,
        }
    }

    /// Build the state described by `config` on top of `store`
    pub fn from_config(config: &Config, store: Arc<dyn TenantStore>) -> Self {
        let cache = Arc::new(TenantCache::with_ttls(
            config.tenant_cache_ttl,
            config.tenant_negative_cache_ttl,
        ));
        let directory = TenantDirectory::new(store, cache);
        let extractor = IdentifierExtractor::new(&config.base_domain, config.tenant_override);

        let mut state = Self::new(extractor, directory)
            .with_override_names(&config.tenant_override_header, &config.tenant_override_query);
        if let Some(token) = &config.admin_api_token {
            state = state.with_admin_token(token);
        }
        state
    }

    pub fn with_override_names(mut self, header: &str, query: &str) -> Self {
        self.override_header = header.to_lowercase();
        self.override_query = query.to_string();
        self
    }

    pub fn with_admin_token(mut self, token: &str) -> Self {
        self.admin_token_digest = Some(digest_token(token));
        self
    }

    pub fn with_redis(mut self, conn: ConnectionManager) -> Self {
        self.redis = Some(conn);
        self
    }
}
