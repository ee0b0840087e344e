//! Score-ordered queue over a store sorted set.
//!
//! Membership is keyed on the *encoded* value: pushing an item whose wire
//! form is already present moves it to the new priority instead of adding a
//! second entry.  `pop` is a single `ZPOPMIN`, so two concurrent poppers can
//! never both receive the same member.

use std::sync::Arc;

use tracing::debug;

use crate::codec::{Codec, IdentityCodec};
use crate::entity::KeyedEntity;
use crate::error::{Error, Result};
use crate::router::ConnectionRouter;
use crate::store::Store;

pub struct PriorityQueue<R, C = IdentityCodec> {
    entity: KeyedEntity<R, C>,
}

impl<R: ConnectionRouter> PriorityQueue<R> {
    pub fn new(key: impl Into<String>, router: Arc<R>) -> Self {
        Self {
            entity: KeyedEntity::new(key, router),
        }
    }
}

impl<R: ConnectionRouter, C: Codec> PriorityQueue<R, C> {
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

    /// Insert `item` with `priority`, or re-score it if already present.
    /// Lower priorities pop first.
    pub async fn push(&self, item: &C::Value, priority: f64) -> Result<()> {
        let key = self.entity.key();
        if priority.is_nan() {
            return Err(Error::InvalidPriority {
                key: key.to_string(),
            });
        }
        let wire = self.entity.encode(item)?;
        self.entity
            .connection_for_write()
            .zadd(key, priority, wire)
            .await?;
        debug!(%key, priority, "priority queue push");
        Ok(())
    }

    /// Remove and return the lowest-priority item, or `None` if empty.
    pub async fn pop(&self) -> Result<Option<C::Value>> {
        Ok(self.pop_with_priority().await?.map(|(item, _)| item))
    }

    /// Like [`pop`](Self::pop), also returning the item's priority.
    pub async fn pop_with_priority(&self) -> Result<Option<(C::Value, f64)>> {
        let key = self.entity.key();
        // The member is removed by its wire form before decoding, so a lossy
        // codec can never cause the wrong member to be removed.
        let Some((wire, priority)) = self.entity.connection_for_write().zpopmin(key).await? else {
            debug!(%key, "priority queue pop: empty");
            return Ok(None);
        };
        debug!(%key, priority, "priority queue pop");
        let item = self.entity.decode(wire)?;
        Ok(Some((item, priority)))
    }

    /// Lowest-priority item and its priority, without removing it.  Served
    /// from the read connection.
    pub async fn peek(&self) -> Result<Option<(C::Value, f64)>> {
        let key = self.entity.key();
        match self.entity.connection_for_read().zpeekmin(key).await? {
            Some((wire, priority)) => Ok(Some((self.entity.decode(wire)?, priority))),
            None => Ok(None),
        }
    }

    pub async fn len(&self) -> Result<u64> {
        let key = self.entity.key();
        self.entity.connection_for_read().zcard(key).await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

impl<R, C: Clone> Clone for PriorityQueue<R, C> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use bytes::Bytes;

    use super::*;
    use crate::codec::{JsonCodec, Utf8Codec};
    use crate::router::ReplicaRouter;
    use crate::store::MemoryStore;

    fn router() -> Arc<ReplicaRouter<MemoryStore>> {
        Arc::new(ReplicaRouter::primary_only(Arc::new(MemoryStore::new())))
    }

    #[tokio::test]
    async fn pops_lowest_priority_first() {
        let queue = PriorityQueue::with_codec("pq", Utf8Codec, router());
        let pushes = [("c", 3.0), ("a", 1.0), ("e", 5.0), ("b", 2.0), ("d", 4.0)];
        for (item, priority) in pushes {
            queue.push(&item.to_string(), priority).await.unwrap();
        }

        let mut last = f64::NEG_INFINITY;
        let mut order = Vec::new();
        while let Some((item, priority)) = queue.pop_with_priority().await.unwrap() {
            assert!(priority >= last);
            last = priority;
            order.push(item);
        }
        assert_eq!(order, ["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn repush_moves_item_instead_of_duplicating() {
        let queue = PriorityQueue::with_codec("pq", Utf8Codec, router());
        queue.push(&"job".to_string(), 10.0).await.unwrap();
        queue.push(&"other".to_string(), 5.0).await.unwrap();
        queue.push(&"job".to_string(), 1.0).await.unwrap();

        assert_eq!(queue.len().await.unwrap(), 2);
        assert_eq!(
            queue.pop_with_priority().await.unwrap(),
            Some(("job".to_string(), 1.0))
        );
        assert_eq!(queue.pop().await.unwrap().as_deref(), Some("other"));
        assert_eq!(queue.pop().await.unwrap(), None);
    }

    #[tokio::test]
    async fn peek_does_not_remove() {
        let queue = PriorityQueue::with_codec("pq", JsonCodec::<u32>::new(), router());
        assert_eq!(queue.peek().await.unwrap(), None);
        queue.push(&7, 0.5).await.unwrap();
        queue.push(&9, -2.0).await.unwrap();
        assert_eq!(queue.peek().await.unwrap(), Some((9, -2.0)));
        assert_eq!(queue.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn nan_priority_is_rejected() {
        let queue = PriorityQueue::new("pq", router());
        let err = queue
            .push(&Bytes::from_static(b"x"), f64::NAN)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPriority { .. }));
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn infinite_priorities_are_ordered() {
        let queue = PriorityQueue::with_codec("pq", Utf8Codec, router());
        queue.push(&"last".to_string(), f64::INFINITY).await.unwrap();
        queue.push(&"first".to_string(), f64::NEG_INFINITY).await.unwrap();
        queue.push(&"middle".to_string(), 0.0).await.unwrap();
        assert_eq!(queue.pop().await.unwrap().as_deref(), Some("first"));
        assert_eq!(queue.pop().await.unwrap().as_deref(), Some("middle"));
        assert_eq!(queue.pop().await.unwrap().as_deref(), Some("last"));
    }

    #[tokio::test]
    async fn empty_pop_differs_from_zero_item() {
        let queue = PriorityQueue::with_codec("pq", JsonCodec::<i64>::new(), router());
        queue.push(&0, 1.0).await.unwrap();
        assert_eq!(queue.pop().await.unwrap(), Some(0));
        assert_eq!(queue.pop().await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pops_take_each_member_once() {
        let queue = Arc::new(PriorityQueue::with_codec("pq", Utf8Codec, router()));
        for i in 0..200 {
            queue.push(&format!("item-{i}"), i as f64).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(item) = queue.pop().await.unwrap() {
                    seen.push(item);
                }
                seen
            }));
        }

        let mut total = 0;
        let mut unique = HashSet::new();
        for handle in handles {
            for item in handle.await.unwrap() {
                total += 1;
                unique.insert(item);
            }
        }
        assert_eq!(total, 200);
        assert_eq!(unique.len(), 200);
    }
}
