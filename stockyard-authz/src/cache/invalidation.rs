//! Cache invalidation for multi-replica deployments.
//!
//! Uses Redis Pub/Sub to broadcast invalidation messages across nodes. Each
//! node applies received messages to its local permission cache. Without
//! Redis configured, invalidation stays node-local.

use futures::StreamExt;
use redis::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::PermissionCache;
use crate::models::{OrgId, UserId};
use crate::{Error, Result};

/// Redis channel name for cache invalidation messages
pub const CACHE_INVALIDATION_CHANNEL: &str = "stockyard:authz:invalidation";

/// Cache invalidation message types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvalidationMessage {
    /// Invalidate the effective set for one principal
    Principal {
        organisation_id: String,
        user_id: String,
    },
    /// Invalidate every principal of an organisation
    Organisation { organisation_id: String },
    /// Invalidate all cached sets (role definition changes)
    All,
}

/// Service for broadcasting and receiving cache invalidation messages
pub struct CacheInvalidationService {
    redis_client: Option<Client>,
    /// Local broadcast sender for invalidation events
    local_sender: broadcast::Sender<InvalidationMessage>,
    node_id: String,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
}

impl Clone for CacheInvalidationService {
    fn clone(&self) -> Self {
        Self {
            redis_client: self.redis_client.clone(),
            local_sender: self.local_sender.clone(),
            node_id: self.node_id.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl CacheInvalidationService {
    /// Create a new cache invalidation service.
    ///
    /// Without a Redis client, only local invalidation is used.
    pub fn new(redis_client: Option<Client>, node_id: String) -> Self {
        let (local_sender, _) = broadcast::channel(1024);

        Self {
            redis_client,
            local_sender,
            node_id,
            shutdown: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Start listening for invalidation messages from Redis and applying
    /// every received message (local or remote) to the given cache.
    pub async fn start(&self, cache: PermissionCache) -> Result<()> {
        // Apply messages from the local channel to the cache. Remote
        // messages are re-broadcast onto the same channel by the subscriber.
        let mut receiver = self.local_sender.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => Self::apply(&cache, &message).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Dropped messages may leave stale entries; clearing
                        // restores correctness at the cost of cold lookups.
                        warn!(skipped, "Invalidation receiver lagged, clearing cache");
                        cache.invalidate_all();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let Some(client) = self.redis_client.clone() else {
            info!("Redis not configured, cache invalidation is local-only");
            return Ok(());
        };

        let local_sender = self.local_sender.clone();
        let node_id = self.node_id.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                if shutdown.load(std::sync::atomic::Ordering::Relaxed) {
                    debug!("Cache invalidation listener shutting down");
                    break;
                }

                match Self::run_subscriber(&client, &local_sender, &node_id, shutdown.clone()).await
                {
                    Ok(()) => break,
                    Err(e) => {
                        error!(
                            error = %e,
                            "Cache invalidation subscriber error, reconnecting in 5 seconds..."
                        );
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }
            info!("Cache invalidation listener stopped");
        });

        Ok(())
    }

    async fn apply(cache: &PermissionCache, message: &InvalidationMessage) {
        match message {
            InvalidationMessage::Principal {
                organisation_id,
                user_id,
            } => {
                cache
                    .invalidate(
                        &OrgId::from_string(organisation_id.clone()),
                        &UserId::from_string(user_id.clone()),
                    )
                    .await;
            }
            InvalidationMessage::Organisation { organisation_id } => {
                cache.invalidate_org(&OrgId::from_string(organisation_id.clone()));
            }
            InvalidationMessage::All => cache.invalidate_all(),
        }
    }

    /// Run the Redis subscriber loop
    async fn run_subscriber(
        client: &Client,
        local_sender: &broadcast::Sender<InvalidationMessage>,
        node_id: &str,
        shutdown: Arc<std::sync::atomic::AtomicBool>,
    ) -> Result<()> {
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| Error::Internal(format!("Failed to get Redis Pub/Sub connection: {e}")))?;

        pubsub
            .subscribe(CACHE_INVALIDATION_CHANNEL)
            .await
            .map_err(|e| Error::Internal(format!("Failed to subscribe: {e}")))?;

        info!(
            node_id = %node_id,
            channel = %CACHE_INVALIDATION_CHANNEL,
            "Subscribed to cache invalidation channel"
        );

        let mut message_stream = pubsub.on_message();

        loop {
            if shutdown.load(std::sync::atomic::Ordering::Relaxed) {
                break;
            }

            // Use timeout to periodically check shutdown flag
            match tokio::time::timeout(
                std::time::Duration::from_secs(1),
                message_stream.next(),
            )
            .await
            {
                Ok(Some(msg)) => {
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(error = %e, "Invalid payload in cache invalidation message");
                            continue;
                        }
                    };

                    match serde_json::from_str::<InvalidationMessage>(&payload) {
                        Ok(invalidation) => {
                            debug!(
                                node_id = %node_id,
                                ?invalidation,
                                "Received cache invalidation message"
                            );

                            if let Err(e) = local_sender.send(invalidation) {
                                warn!(
                                    error = %e,
                                    "Failed to broadcast invalidation locally"
                                );
                            }
                        }
                        Err(e) => {
                            warn!(
                                error = %e,
                                json = %payload,
                                "Failed to parse invalidation message"
                            );
                        }
                    }
                }
                Ok(None) => {
                    info!("Redis Pub/Sub stream ended, reconnecting...");
                    return Err(Error::Internal("Redis Pub/Sub stream ended".to_string()));
                }
                Err(_) => {
                    // Timeout, check shutdown flag and continue
                    continue;
                }
            }
        }

        Ok(())
    }

    /// Stop the cache invalidation service
    pub fn stop(&self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    /// Subscribe to local cache invalidation events
    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationMessage> {
        self.local_sender.subscribe()
    }

    /// Broadcast an invalidation message to all OTHER nodes (remote only).
    ///
    /// The caller is expected to have already invalidated its own local
    /// cache. Without Redis configured, this is a no-op.
    pub async fn broadcast_remote(&self, message: InvalidationMessage) -> Result<()> {
        if let Some(ref client) = self.redis_client {
            let json = serde_json::to_string(&message)?;

            let mut conn = client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| Error::Internal(format!("Redis connection failed: {e}")))?;

            redis::AsyncCommands::publish::<_, _, ()>(
                &mut conn,
                CACHE_INVALIDATION_CHANNEL,
                json,
            )
            .await
            .map_err(|e| Error::Internal(format!("Failed to publish invalidation: {e}")))?;

            debug!(
                node_id = %self.node_id,
                ?message,
                "Published cache invalidation message"
            );
        }

        Ok(())
    }

    /// Broadcast an invalidation message to ALL nodes including this one.
    pub async fn broadcast_all(&self, message: InvalidationMessage) -> Result<()> {
        if let Err(e) = self.local_sender.send(message.clone()) {
            warn!(error = %e, "Failed to broadcast invalidation locally");
        }

        self.broadcast_remote(message).await
    }

    /// Invalidate the effective set of one principal on every node.
    pub async fn invalidate_principal(
        &self,
        organisation_id: &OrgId,
        user_id: &UserId,
    ) -> Result<()> {
        self.broadcast_remote(InvalidationMessage::Principal {
            organisation_id: organisation_id.as_str().to_string(),
            user_id: user_id.as_str().to_string(),
        })
        .await
    }

    /// Invalidate every principal of an organisation on every node.
    pub async fn invalidate_organisation(&self, organisation_id: &OrgId) -> Result<()> {
        self.broadcast_remote(InvalidationMessage::Organisation {
            organisation_id: organisation_id.as_str().to_string(),
        })
        .await
    }

    /// Invalidate all cached sets on every node.
    pub async fn invalidate_everything(&self) -> Result<()> {
        self.broadcast_remote(InvalidationMessage::All).await
    }
}

impl std::fmt::Debug for CacheInvalidationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInvalidationService")
            .field("redis_enabled", &self.redis_client.is_some())
            .field("node_id", &self.node_id)
            .finish()
    }
}
