//! In-process [`Store`] for tests and single-process deployments.
//!
//! Mirrors the KeyDB semantics the primitives rely on: every call runs in one
//! critical section, expired keys disappear lazily on next access, commands
//! against a key of another type fail with [`Error::WrongType`], and lists and
//! sorted sets are removed once they become empty.
//!
//! Expiry is measured with [`tokio::time::Instant`], so tests running on a
//! paused clock can move past a TTL with `tokio::time::advance`.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{ttl_millis, KeyTtl, Store};
use crate::error::{Error, Result};

#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

enum Data {
    /// Plain string value.  Only presence and expiry are ever observed.
    String,
    List(VecDeque<Bytes>),
    SortedSet(SortedSet),
}

impl Entry {
    fn persistent(data: Data) -> Self {
        Self {
            data,
            expires_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Sorted set
// ---------------------------------------------------------------------------

/// Score with a total order.  `-0.0` is folded into `0.0` on insert.
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Members ordered by score, ties broken by member bytes.
#[derive(Default)]
struct SortedSet {
    scores: HashMap<Bytes, Score>,
    order: BTreeSet<(Score, Bytes)>,
}

impl SortedSet {
    fn insert(&mut self, member: Bytes, score: f64) {
        let score = Score(if score == 0.0 { 0.0 } else { score });
        if let Some(previous) = self.scores.insert(member.clone(), score) {
            self.order.remove(&(previous, member.clone()));
        }
        self.order.insert((score, member));
    }

    fn first(&self) -> Option<(Bytes, f64)> {
        self.order
            .first()
            .map(|(score, member)| (member.clone(), score.0))
    }

    fn pop_first(&mut self) -> Option<(Bytes, f64)> {
        let (score, member) = self.order.pop_first()?;
        self.scores.remove(&member);
        Some((member, score.0))
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Drop `key` if its deadline has passed, then return whatever is left.
fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    let expired = entries
        .get(key)
        .and_then(|entry| entry.expires_at)
        .is_some_and(|deadline| deadline <= Instant::now());
    if expired {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn wrong_type(key: &str) -> Error {
    Error::WrongType {
        key: key.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[async_trait]
impl Store for MemoryStore {
    async fn lpush(&self, key: &str, value: Bytes) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key) {
            Some(Entry {
                data: Data::List(list),
                ..
            }) => {
                list.push_front(value);
                Ok(list.len() as u64)
            }
            Some(_) => Err(wrong_type(key)),
            None => {
                entries.insert(
                    key.to_string(),
                    Entry::persistent(Data::List(VecDeque::from([value]))),
                );
                Ok(1)
            }
        }
    }

    async fn rpop(&self, key: &str) -> Result<Option<Bytes>> {
        let mut entries = self.entries.lock().await;
        let (popped, now_empty) = match live(&mut entries, key) {
            Some(Entry {
                data: Data::List(list),
                ..
            }) => (list.pop_back(), list.is_empty()),
            Some(_) => return Err(wrong_type(key)),
            None => return Ok(None),
        };
        if now_empty {
            entries.remove(key);
        }
        Ok(popped)
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key) {
            Some(Entry {
                data: Data::List(list),
                ..
            }) => Ok(list.len() as u64),
            Some(_) => Err(wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn zadd(&self, key: &str, score: f64, member: Bytes) -> Result<()> {
        if score.is_nan() {
            return Err(Error::InvalidPriority {
                key: key.to_string(),
            });
        }
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key) {
            Some(Entry {
                data: Data::SortedSet(set),
                ..
            }) => set.insert(member, score),
            Some(_) => return Err(wrong_type(key)),
            None => {
                let mut set = SortedSet::default();
                set.insert(member, score);
                entries.insert(key.to_string(), Entry::persistent(Data::SortedSet(set)));
            }
        }
        Ok(())
    }

    async fn zpopmin(&self, key: &str) -> Result<Option<(Bytes, f64)>> {
        let mut entries = self.entries.lock().await;
        let (popped, now_empty) = match live(&mut entries, key) {
            Some(Entry {
                data: Data::SortedSet(set),
                ..
            }) => (set.pop_first(), set.len() == 0),
            Some(_) => return Err(wrong_type(key)),
            None => return Ok(None),
        };
        if now_empty {
            entries.remove(key);
        }
        Ok(popped)
    }

    async fn zpeekmin(&self, key: &str) -> Result<Option<(Bytes, f64)>> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key) {
            Some(Entry {
                data: Data::SortedSet(set),
                ..
            }) => Ok(set.first()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key) {
            Some(Entry {
                data: Data::SortedSet(set),
                ..
            }) => Ok(set.len() as u64),
            Some(_) => Err(wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        Ok(live(&mut entries, key).is_some())
    }

    async fn set_nx(&self, key: &str, _value: Bytes, ttl: Option<Duration>) -> Result<bool> {
        let invalid = || Error::InvalidExpiration {
            key: key.to_string(),
        };
        let deadline = match ttl {
            Some(ttl) if ttl.is_zero() => return Err(invalid()),
            // Whole milliseconds, rounded up, the same as a `PX` argument.
            Some(ttl) => {
                let millis = ttl_millis(ttl).ok_or_else(invalid)?;
                let deadline = Instant::now()
                    .checked_add(Duration::from_millis(millis.unsigned_abs()))
                    .ok_or_else(invalid)?;
                Some(deadline)
            }
            None => None,
        };
        let mut entries = self.entries.lock().await;
        if live(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                data: Data::String,
                expires_at: deadline,
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if live(&mut entries, key).is_none() {
            return Ok(false);
        }
        Ok(entries.remove(key).is_some())
    }

    async fn pttl(&self, key: &str) -> Result<KeyTtl> {
        let mut entries = self.entries.lock().await;
        Ok(match live(&mut entries, key) {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(deadline),
                ..
            }) => KeyTtl::Expires(deadline.saturating_duration_since(Instant::now())),
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
