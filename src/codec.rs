//! Value codecs.
//!
//! A [`Codec`] converts between the application's values and the byte strings
//! stored in KeyDB.  Every entity is bound to exactly one codec at
//! construction time; [`IdentityCodec`] is the default and stores bytes
//! unchanged.

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;

/// Encode/decode pair for one value type.
///
/// Implementations must satisfy `decode(encode(v)) == v` for every value a
/// caller intends to store.
pub trait Codec: Send + Sync {
    type Value;

    fn encode(&self, value: &Self::Value) -> Result<Bytes, CodecError>;

    fn decode(&self, wire: Bytes) -> Result<Self::Value, CodecError>;
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Pass-through codec: the stored bytes are the value.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    type Value = Bytes;

    fn encode(&self, value: &Bytes) -> Result<Bytes, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, wire: Bytes) -> Result<Bytes, CodecError> {
        Ok(wire)
    }
}

// ---------------------------------------------------------------------------
// UTF-8 strings
// ---------------------------------------------------------------------------

/// Plain string values.  Decoding fails on bytes that are not valid UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl Codec for Utf8Codec {
    type Value = String;

    fn encode(&self, value: &String) -> Result<Bytes, CodecError> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }

    fn decode(&self, wire: Bytes) -> Result<String, CodecError> {
        Ok(String::from_utf8(wire.to_vec())?)
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Any serde type, stored as compact JSON.
///
/// Note that the priority queue keys membership on the encoded bytes, so two
/// values that serialize identically are the same member.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T> Codec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    fn decode(&self, wire: Bytes) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(&wire)?)
    }
}
