//! Distributed primitives on top of KeyDB / Redis.
//!
//! - [`Queue`]: FIFO queue (`LPUSH` / `RPOP`)
//! - [`PriorityQueue`]: lowest-score-first queue (`ZADD` / `ZPOPMIN`)
//! - [`Lock`]: non-reentrant mutex with optional expiry (`SET NX PX` / `DEL`)
//!
//! Each primitive is a [`KeyedEntity`]: a key, a [`Codec`] for values, and a
//! [`ConnectionRouter`] that sends writes to the primary and reads to a
//! replica when one is configured.  Entities keep no local state, so any
//! number of them may point at the same key from any number of processes.
//! Every mutating operation is a single atomic store command.
//!
//! Build the router once at startup and hand it to every entity:
//!
//! ```ignore
//! use std::sync::Arc;
//! use keyed_primitives::{load_config, JsonCodec, Lock, Queue, ReplicaRouter};
//!
//! let config = load_config("/etc/keyed/store.yaml")?;
//! let router = Arc::new(ReplicaRouter::connect(&config).await?);
//!
//! let jobs = Queue::with_codec("jobs", JsonCodec::<Job>::new(), Arc::clone(&router));
//! jobs.push(&job).await?;
//!
//! let lock = Lock::new("lock:reindex", router);
//! if lock.acquire(Some(Duration::from_secs(30))).await? {
//!     // ...
//!     lock.release().await?;
//! }
//! ```

pub mod codec;
pub mod config;
pub mod entity;
pub mod error;
pub mod health;
pub mod lock;
pub mod metrics;
pub mod priority_queue;
pub mod queue;
pub mod router;
pub mod store;

pub use codec::{Codec, IdentityCodec, JsonCodec, Utf8Codec};
pub use config::{load_config, parse_config, EndpointConfig, StoreConfig};
pub use entity::KeyedEntity;
pub use error::{CodecError, Error, Result};
pub use health::{check_router, HealthReport, HealthStatus};
pub use lock::Lock;
pub use metrics::{MetricsRegistry, StoreMetrics};
pub use priority_queue::PriorityQueue;
pub use queue::Queue;
pub use router::{ConnectionRouter, ReplicaRouter};
pub use store::{InstrumentedStore, KeyDbStore, KeyTtl, MemoryStore, Store};
