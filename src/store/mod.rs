//! Store protocol consumed by every primitive.
//!
//! [`Store`] names the single-command primitives the queue, priority queue
//! and lock are built from.  Each method is exactly one round trip and is
//! atomic on the server, so check-then-act sequences never span two calls.
//!
//! - [`KeyDbStore`] talks to KeyDB / Redis through a `fred` pool.
//! - [`MemoryStore`] keeps everything in-process with the same semantics.
//! - [`InstrumentedStore`] wraps either one and records Prometheus metrics.

pub mod instrumented;
pub mod keydb;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use instrumented::InstrumentedStore;
pub use keydb::KeyDbStore;
pub use memory::MemoryStore;

/// Expiration state of a key, as reported by `PTTL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist.
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key exists and expires after the given duration.
    Expires(Duration),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Prepend `value` to the list at `key`.  Returns the new length.
    async fn lpush(&self, key: &str, value: Bytes) -> Result<u64>;

    /// Remove and return the last element of the list at `key`.
    async fn rpop(&self, key: &str) -> Result<Option<Bytes>>;

    async fn llen(&self, key: &str) -> Result<u64>;

    /// Insert `member` with `score`, or update the score if the member is
    /// already present.
    async fn zadd(&self, key: &str, score: f64, member: Bytes) -> Result<()>;

    /// Remove and return the lowest-scored member.
    async fn zpopmin(&self, key: &str) -> Result<Option<(Bytes, f64)>>;

    /// Return the lowest-scored member without removing it.
    async fn zpeekmin(&self, key: &str) -> Result<Option<(Bytes, f64)>>;

    async fn zcard(&self, key: &str) -> Result<u64>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Set `key` only if it does not exist, optionally with a time-to-live.
    /// Returns `true` when the value was written.
    async fn set_nx(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<bool>;

    /// Delete `key`.  Returns `true` if it existed.
    async fn del(&self, key: &str) -> Result<bool>;

    async fn pttl(&self, key: &str) -> Result<KeyTtl>;

    async fn ping(&self) -> Result<()>;
}

/// Interpret a raw `PTTL` reply.
pub(crate) fn key_ttl_from_pttl(millis: i64) -> KeyTtl {
    match millis {
        -2 => KeyTtl::Missing,
        ms if ms < 0 => KeyTtl::Persistent,
        ms => KeyTtl::Expires(Duration::from_millis(ms as u64)),
    }
}

/// `PX` argument for a TTL, rounded up to a whole millisecond.  `None` when
/// the TTL does not fit in a signed 64-bit millisecond count.
pub(crate) fn ttl_millis(ttl: Duration) -> Option<i64> {
    i64::try_from(ttl.as_nanos().div_ceil(1_000_000)).ok()
}
