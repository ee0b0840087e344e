//! Read/write connection routing.
//!
//! Mutating commands (push, pop, acquire, release) depend on single-key
//! atomicity and read-after-write consistency, so they always go to the
//! primary.  Pure reads may be served by a replica.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::trace;

use crate::config::StoreConfig;
use crate::store::{KeyDbStore, Store};

/// Resolves the connection an entity should use for a given key.
pub trait ConnectionRouter: Send + Sync {
    type Connection: Store + ?Sized;

    /// Connection for read-only commands.
    fn connection_for_read(&self, key: &str) -> &Self::Connection;

    /// Connection for mutating commands.  Must be the primary.
    fn connection_for_write(&self, key: &str) -> &Self::Connection;
}

/// Primary plus optional replica.  Reads prefer the replica; writes always
/// use the primary.
pub struct ReplicaRouter<S: ?Sized> {
    primary: Arc<S>,
    replica: Option<Arc<S>>,
}

impl<S: Store + ?Sized> ReplicaRouter<S> {
    pub fn new(primary: Arc<S>, replica: Option<Arc<S>>) -> Self {
        Self { primary, replica }
    }

    /// Route everything to `primary`.
    pub fn primary_only(primary: Arc<S>) -> Self {
        Self::new(primary, None)
    }

    pub fn primary(&self) -> &Arc<S> {
        &self.primary
    }

    pub fn replica(&self) -> Option<&Arc<S>> {
        self.replica.as_ref()
    }
}

impl ReplicaRouter<KeyDbStore> {
    /// Connect the primary and, when configured, the replica pool.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let primary = KeyDbStore::connect(&config.primary, config.pool_size)
            .await
            .context("failed to connect primary")?;
        let replica = match &config.replica {
            Some(endpoint) => Some(Arc::new(
                KeyDbStore::connect(endpoint, config.pool_size)
                    .await
                    .context("failed to connect replica")?,
            )),
            None => None,
        };
        tracing::info!(replica = replica.is_some(), "store router ready");
        Ok(Self::new(Arc::new(primary), replica))
    }
}

impl<S: Store + ?Sized> ConnectionRouter for ReplicaRouter<S> {
    type Connection = S;

    fn connection_for_read(&self, key: &str) -> &S {
        match &self.replica {
            Some(replica) => {
                trace!(%key, "routing read to replica");
                replica
            }
            None => {
                trace!(%key, "routing read to primary");
                &self.primary
            }
        }
    }

    fn connection_for_write(&self, key: &str) -> &S {
        trace!(%key, "routing write to primary");
        &self.primary
    }
}

impl<S: ?Sized> Clone for ReplicaRouter<S> {
    fn clone(&self) -> Self {
        Self {
            primary: Arc::clone(&self.primary),
            replica: self.replica.clone(),
        }
    }
}
