//! Error types shared by construction, children resolution, merging and
//! hydration.

use std::sync::Arc;

use crate::node::SourceReference;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building, resolving or hydrating nodes.
///
/// Errors are `Clone` so a failure observed inside a shared (replayed) future
/// can be handed to every consumer that awaits it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The source value matched none of the recognised source kinds.
    #[error("unexpected node source: {0}")]
    Classification(String),

    /// A user supplied function, future, stream or generator failed.
    #[error("producer failed: {0}")]
    Producer(Arc<dyn std::error::Error + Send + Sync>),

    /// A producer failure described only by a message.
    #[error("producer failed: {0}")]
    Message(String),

    /// A context hydrate hook failed and no catch hook recovered it.
    #[error("hydration of {reference} failed: {source}")]
    Hydrate {
        /// Reference of the node being hydrated.
        reference: SourceReference,
        /// The underlying failure.
        source: Box<Error>,
    },

    /// A node could not be represented in marshalled form.
    #[error("marshal error: {0}")]
    Marshal(String),

    /// JSON encoding or decoding of a marshalled node failed.
    #[error("json error: {0}")]
    Json(Arc<serde_json::Error>),

    /// MessagePack encoding of a marshalled node failed.
    #[error("msgpack encode error: {0}")]
    Encode(Arc<rmp_serde::encode::Error>),

    /// MessagePack decoding of a marshalled node failed.
    #[error("msgpack decode error: {0}")]
    Decode(Arc<rmp_serde::decode::Error>),
}

impl Error {
    /// Wrap an arbitrary producer error.
    pub fn producer<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Producer(Arc::new(error))
    }

    /// Build a producer failure from a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Whether this error came from a user producer rather than the engine.
    pub fn is_producer(&self) -> bool {
        matches!(self, Self::Producer(_) | Self::Message(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(Arc::new(error))
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(error: rmp_serde::encode::Error) -> Self {
        Self::Encode(Arc::new(error))
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(error: rmp_serde::decode::Error) -> Self {
        Self::Decode(Arc::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_errors_are_tagged() {
        let io = std::io::Error::other("boom");
        assert!(Error::producer(io).is_producer());
        assert!(Error::message("boom").is_producer());
        assert!(!Error::Classification("x".into()).is_producer());
    }

    #[test]
    fn hydrate_error_mentions_reference() {
        let error = Error::Hydrate {
            reference: SourceReference::from("root"),
            source: Box::new(Error::message("paint failed")),
        };
        let text = error.to_string();
        assert!(text.contains("root"));
        assert!(text.contains("paint failed"));
    }
}
