//! Error types shared by every primitive.

use thiserror::Error;

/// Failure converting between an application value and its wire form.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Errors returned by queue, priority-queue and lock operations.
///
/// An empty `pop()` or a `release()` of a free lock is not an error; those
/// come back as `None` / `false`.
#[derive(Debug, Error)]
pub enum Error {
    /// The store could not be reached or rejected the command.
    #[error("store command {command} failed: {source}")]
    Store {
        /// Command name, e.g. `ZPOPMIN`.
        command: &'static str,
        #[source]
        source: fred::error::Error,
    },

    /// The key holds a different data type than the command expects.
    #[error("key '{key}' holds a value of the wrong type")]
    WrongType { key: String },

    #[error("failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: CodecError,
    },

    /// A stored wire value could not be decoded by the entity's codec.
    #[error("failed to decode value stored at '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: CodecError,
    },

    /// NaN has no place in a score-ordered set.
    #[error("priority for '{key}' must not be NaN")]
    InvalidPriority { key: String },

    #[error("lock expiration for '{key}' must be greater than zero")]
    InvalidExpiration { key: String },
}

impl Error {
    pub(crate) fn store(command: &'static str) -> impl FnOnce(fred::error::Error) -> Self {
        move |source| Error::Store { command, source }
    }

    /// `true` for failures reaching or executing on the store.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Store { .. })
    }

    /// `true` when a stored value could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
