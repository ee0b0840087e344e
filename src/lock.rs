//! Non-reentrant mutex over a single store key.
//!
//! The key's presence means "held" and its absence means "free".  There is no
//! holder identity or fencing token: any caller may release a lock it never
//! acquired.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::entity::KeyedEntity;
use crate::error::{Error, Result};
use crate::router::ConnectionRouter;
use crate::store::{KeyTtl, Store};

/// Value written under a held lock's key.
pub const LOCK_SENTINEL: &[u8] = b"1";

pub struct Lock<R> {
    entity: KeyedEntity<R>,
}

impl<R: ConnectionRouter> Lock<R> {
    pub fn new(key: impl Into<String>, router: Arc<R>) -> Self {
        Self {
            entity: KeyedEntity::new(key, router),
        }
    }

    pub fn key(&self) -> &str {
        self.entity.key()
    }

    pub fn entity(&self) -> &KeyedEntity<R> {
        &self.entity
    }

    /// Try to take the lock.  Returns `false` without side effects if it is
    /// already held.
    ///
    /// With an `expiration` the store frees the lock on its own once that
    /// much time has passed.  Sub-millisecond expirations round up to one
    /// millisecond; a zero expiration is rejected.
    pub async fn acquire(&self, expiration: Option<Duration>) -> Result<bool> {
        let key = self.entity.key();
        if expiration.is_some_and(|ttl| ttl.is_zero()) {
            return Err(Error::InvalidExpiration {
                key: key.to_string(),
            });
        }
        let acquired = self
            .entity
            .connection_for_write()
            .set_nx(key, Bytes::from_static(LOCK_SENTINEL), expiration)
            .await?;
        debug!(%key, acquired, ?expiration, "lock acquire");
        Ok(acquired)
    }

    /// Free the lock.  Returns `true` if it was held.
    pub async fn release(&self) -> Result<bool> {
        let key = self.entity.key();
        let released = self.entity.connection_for_write().del(key).await?;
        debug!(%key, released, "lock release");
        Ok(released)
    }

    /// Whether the lock is currently held, as seen by the read connection.
    pub async fn is_locked(&self) -> Result<bool> {
        let key = self.entity.key();
        self.entity.connection_for_read().exists(key).await
    }

    /// Time until an expiring lock frees itself.  `None` when the lock is
    /// free or was taken without an expiration.
    pub async fn remaining_ttl(&self) -> Result<Option<Duration>> {
        let key = self.entity.key();
        match self.entity.connection_for_read().pttl(key).await? {
            KeyTtl::Expires(remaining) => Ok(Some(remaining)),
            KeyTtl::Missing | KeyTtl::Persistent => Ok(None),
        }
    }
}

impl<R> Clone for Lock<R> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
        }
    }
}
