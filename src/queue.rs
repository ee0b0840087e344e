//! FIFO queue over a store list.
//!
//! Items are pushed at the head (`LPUSH`) and popped from the tail (`RPOP`),
//! so with no interleaved pops they come back in push order.

use std::sync::Arc;

use tracing::debug;

use crate::codec::{Codec, IdentityCodec};
use crate::entity::KeyedEntity;
use crate::error::Result;
use crate::router::ConnectionRouter;
use crate::store::Store;

pub struct Queue<R, C = IdentityCodec> {
    entity: KeyedEntity<R, C>,
}

impl<R: ConnectionRouter> Queue<R> {
    pub fn new(key: impl Into<String>, router: Arc<R>) -> Self {
        Self {
            entity: KeyedEntity::new(key, router),
        }
    }
}

impl<R: ConnectionRouter, C: Codec> Queue<R, C> {
    pub fn with_codec(key: impl Into<String>, codec: C, router: Arc<R>) -> Self {
        Self {
            entity: KeyedEntity::with_codec(key, codec, router),
        }
    }

    pub fn key(&self) -> &str {
        self.entity.key()
    }

    pub fn entity(&self) -> &KeyedEntity<R, C> {
        &self.entity
    }

    /// Append `item` to the queue.  Returns the queue length after the push.
    ///
    /// No length bound is enforced here.
    pub async fn push(&self, item: &C::Value) -> Result<u64> {
        let wire = self.entity.encode(item)?;
        let key = self.entity.key();
        let len = self.entity.connection_for_write().lpush(key, wire).await?;
        debug!(%key, len, "queue push");
        Ok(len)
    }

    /// Remove and return the oldest item, or `None` if the queue is empty.
    ///
    /// `Some` always carries a decoded value, even when that value is empty.
    pub async fn pop(&self) -> Result<Option<C::Value>> {
        let key = self.entity.key();
        let Some(wire) = self.entity.connection_for_write().rpop(key).await? else {
            debug!(%key, "queue pop: empty");
            return Ok(None);
        };
        debug!(%key, bytes = wire.len(), "queue pop");
        self.entity.decode(wire).map(Some)
    }

    /// Number of queued items, served from the read connection.
    pub async fn len(&self) -> Result<u64> {
        let key = self.entity.key();
        self.entity.connection_for_read().llen(key).await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

impl<R, C: Clone> Clone for Queue<R, C> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
        }
    }
}
