//! Metrics decorator for any [`Store`].

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;

use super::{KeyTtl, Store};
use crate::error::Result;
use crate::metrics::{Outcome, StoreMetrics};

/// Wraps a store and records one counter sample and one latency sample per
/// command.  Results and errors pass through untouched.
pub struct InstrumentedStore<S> {
    inner: S,
    metrics: Arc<StoreMetrics>,
}

impl<S: Store> InstrumentedStore<S> {
    pub fn new(inner: S, metrics: Arc<StoreMetrics>) -> Self {
        Self { inner, metrics }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn observe<T, F>(&self, command: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let result = call.await;
        let outcome = if result.is_ok() {
            Outcome::Ok
        } else {
            Outcome::Error
        };
        self.metrics
            .record(command, outcome, started.elapsed().as_secs_f64());
        result
    }
}

#[async_trait]
impl<S: Store> Store for InstrumentedStore<S> {
    async fn lpush(&self, key: &str, value: Bytes) -> Result<u64> {
        self.observe("LPUSH", self.inner.lpush(key, value)).await
    }

    async fn rpop(&self, key: &str) -> Result<Option<Bytes>> {
        self.observe("RPOP", self.inner.rpop(key)).await
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        self.observe("LLEN", self.inner.llen(key)).await
    }

    async fn zadd(&self, key: &str, score: f64, member: Bytes) -> Result<()> {
        self.observe("ZADD", self.inner.zadd(key, score, member))
            .await
    }

    async fn zpopmin(&self, key: &str) -> Result<Option<(Bytes, f64)>> {
        self.observe("ZPOPMIN", self.inner.zpopmin(key)).await
    }

    async fn zpeekmin(&self, key: &str) -> Result<Option<(Bytes, f64)>> {
        self.observe("ZRANGE", self.inner.zpeekmin(key)).await
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        self.observe("ZCARD", self.inner.zcard(key)).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.observe("EXISTS", self.inner.exists(key)).await
    }

    async fn set_nx(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<bool> {
        self.observe("SET", self.inner.set_nx(key, value, ttl))
            .await
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.observe("DEL", self.inner.del(key)).await
    }

    async fn pttl(&self, key: &str) -> Result<KeyTtl> {
        self.observe("PTTL", self.inner.pttl(key)).await
    }

    async fn ping(&self) -> Result<()> {
        self.observe("PING", self.inner.ping()).await
    }
}
