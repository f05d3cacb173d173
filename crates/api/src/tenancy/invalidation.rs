//! Cross-instance cache invalidation
//!
//! Tenant mutations are announced as JSON on a Redis pub/sub channel. Every
//! instance runs a listener that applies them to its own directory cache, so
//! a suspended or re-aliased tenant is not served from a stale entry until
//! the TTL runs out.

use campfire_shared::{Tenant, TenantId};
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, error, info, warn};

use super::directory::TenantDirectory;
use super::identifier::TenantIdentifier;

/// Channel tenant mutation events are published on
pub const MUTATION_CHANNEL: &str = "campfire:tenant-mutations";

const RECONNECT_BASE_DELAY_MS: u64 = 100;
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// A tenant changed; every cached view of it must go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMutationEvent {
    pub tenant_id: TenantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<String>,
}

impl TenantMutationEvent {
    /// Event naming only the tenant id
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            slug: None,
            subdomain: None,
            custom_domain: None,
        }
    }

    /// Event naming the tenant's current aliases
    pub fn for_tenant(tenant: &Tenant) -> Self {
        Self {
            tenant_id: tenant.id,
            slug: Some(tenant.slug.clone()),
            subdomain: tenant.subdomain.clone(),
            custom_domain: tenant.custom_domain.clone(),
        }
    }

    /// Every cache key this event touches
    pub fn identifiers(&self) -> Vec<TenantIdentifier> {
        let mut identifiers = vec![TenantIdentifier::ExplicitOverride(self.tenant_id.to_string())];

        if let Some(slug) = &self.slug {
            identifiers.push(TenantIdentifier::ExplicitOverride(slug.to_ascii_lowercase()));
        }
        if let Some(subdomain) = &self.subdomain {
            identifiers.push(TenantIdentifier::Subdomain(subdomain.to_ascii_lowercase()));
        }
        if let Some(domain) = &self.custom_domain {
            identifiers.push(TenantIdentifier::CustomDomain(domain.to_ascii_lowercase()));
        }

        identifiers
    }
}

/// Errors publishing invalidation events
#[derive(Debug, thiserror::Error)]
pub enum InvalidationError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to encode mutation event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Announce a tenant mutation to every instance
pub async fn publish_mutation(
    conn: &mut ConnectionManager,
    event: &TenantMutationEvent,
) -> Result<usize, InvalidationError> {
    let payload = serde_json::to_string(event)?;
    let receivers: usize = conn.publish(MUTATION_CHANNEL, payload).await?;

    debug!(tenant_id = %event.tenant_id, receivers, "Published tenant mutation");
    Ok(receivers)
}

/// Apply one raw channel payload to the directory
pub fn handle_payload(
    directory: &TenantDirectory,
    payload: &str,
) -> Result<TenantMutationEvent, serde_json::Error> {
    let event: TenantMutationEvent = serde_json::from_str(payload)?;
    directory.apply_mutation(&event);
    Ok(event)
}

/// Run the invalidation listener until the runtime shuts down.
///
/// Lost connections are re-established with exponential backoff.
pub fn spawn_invalidation_listener(client: redis::Client, directory: TenantDirectory) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let strategy = ExponentialBackoff::from_millis(RECONNECT_BASE_DELAY_MS)
                .max_delay(RECONNECT_MAX_DELAY)
                .map(jitter);

            let subscribed = Retry::start(strategy, || subscribe(&client)).await;

            let mut pubsub = match subscribed {
                Ok(pubsub) => pubsub,
                Err(e) => {
                    error!(error = %e, "Giving up on tenant mutation subscription");
                    return;
                }
            };

            info!(channel = MUTATION_CHANNEL, "Listening for tenant mutations");

            // Anything missed while disconnected is unknown; start clean
            directory.invalidate_all();

            let mut messages = pubsub.on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "Ignoring undecodable tenant mutation");
                        continue;
                    }
                };

                if let Err(e) = handle_payload(&directory, &payload) {
                    warn!(error = %e, "Ignoring malformed tenant mutation");
                }
            }

            warn!("Tenant mutation subscription closed, reconnecting");
        }
    })
}

async fn subscribe(client: &redis::Client) -> redis::RedisResult<redis::aio::PubSub> {
    let attempt = async {
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(MUTATION_CHANNEL).await?;
        Ok(pubsub)
    };

    attempt.await.map_err(|e: redis::RedisError| {
        warn!(error = %e, "Failed to subscribe to tenant mutations, retrying");
        e
    })
}
