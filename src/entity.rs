//! Shared base for every keyed primitive.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::codec::{Codec, IdentityCodec};
use crate::error::{Error, Result};
use crate::router::ConnectionRouter;

/// A logical key bound to a codec and a connection router.
///
/// Entities hold no state of their own; everything lives in the store under
/// `key`, so they are cheap to build per resource name and need no teardown.
pub struct KeyedEntity<R, C = IdentityCodec> {
    key: String,
    codec: C,
    router: Arc<R>,
}

impl<R: ConnectionRouter> KeyedEntity<R> {
    pub fn new(key: impl Into<String>, router: Arc<R>) -> Self {
        Self::with_codec(key, IdentityCodec, router)
    }
}

impl<R: ConnectionRouter, C: Codec> KeyedEntity<R, C> {
    pub fn with_codec(key: impl Into<String>, codec: C, router: Arc<R>) -> Self {
        Self {
            key: key.into(),
            codec,
            router,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn router(&self) -> &Arc<R> {
        &self.router
    }

    pub fn encode(&self, value: &C::Value) -> Result<Bytes> {
        self.codec.encode(value).map_err(|source| Error::Encode {
            key: self.key.clone(),
            source,
        })
    }

    pub fn decode(&self, wire: Bytes) -> Result<C::Value> {
        self.codec.decode(wire).map_err(|source| Error::Decode {
            key: self.key.clone(),
            source,
        })
    }

    pub fn connection_for_read(&self) -> &R::Connection {
        self.router.connection_for_read(&self.key)
    }

    pub fn connection_for_write(&self) -> &R::Connection {
        self.router.connection_for_write(&self.key)
    }
}

impl<R, C: Clone> Clone for KeyedEntity<R, C> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            codec: self.codec.clone(),
            router: Arc::clone(&self.router),
        }
    }
}

impl<R, C> fmt::Debug for KeyedEntity<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedEntity").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Utf8Codec;
    use crate::router::ReplicaRouter;
    use crate::store::MemoryStore;

    fn router() -> Arc<ReplicaRouter<MemoryStore>> {
        Arc::new(ReplicaRouter::primary_only(Arc::new(MemoryStore::new())))
    }

    #[test]
    fn default_codec_is_identity() {
        let entity = KeyedEntity::new("raw", router());
        let value = Bytes::from_static(b"\x01\x02");
        let wire = entity.encode(&value).unwrap();
        assert_eq!(entity.decode(wire).unwrap(), value);
    }

    #[test]
    fn decode_failure_carries_key() {
        let entity = KeyedEntity::with_codec("names", Utf8Codec, router());
        let err = entity.decode(Bytes::from_static(&[0xff, 0xfe])).unwrap_err();
        match err {
            Error::Decode { key, .. } => assert_eq!(key, "names"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn debug_shows_key_only() {
        let entity = KeyedEntity::new("jobs", router());
        assert_eq!(format!("{entity:?}"), r#"KeyedEntity { key: "jobs" }"#);
    }
}
