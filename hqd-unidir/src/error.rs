//! Error types for unidirectional stream dispatch.

use hqd_x::StreamId;
use std::io;
use thiserror::Error;

/// Errors from the QUIC variable-length integer codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VarintError {
    #[error("value {0} exceeds the varint maximum (2^62 - 1)")]
    Overflow(u64),

    #[error("incomplete varint: need {needed} bytes, have {available}")]
    Incomplete { needed: usize, available: usize },

    #[error("buffer too small for varint: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Internal-consistency faults of the dispatcher.
///
/// None of these are caused by the peer. They mean a stream registration was
/// leaked or duplicated by the code driving the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// `take_temporary_ownership` for a stream that is already pending.
    #[error("stream {0} is already owned by the dispatcher")]
    AlreadyOwned(StreamId),

    /// `release_ownership` for a stream that is not pending.
    #[error("cannot release ownership of unowned stream {0}")]
    NotOwned(StreamId),

    /// A peek event arrived for a stream the dispatcher does not own.
    #[error("peek event for unknown stream {0}")]
    UnknownStream(StreamId),

    /// The configured pending-stream limit is reached.
    #[error("pending stream limit reached ({limit}), cannot take stream {id}")]
    TooManyPendingStreams { id: StreamId, limit: usize },
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}
