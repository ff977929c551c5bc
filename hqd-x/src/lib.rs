//! hqd-x: Transport Bridge Interface for Unidirectional Stream Dispatch
//!
//! This crate defines the interface between a multiplexed transport (QUIC)
//! and the components that consume its streams. It mirrors the callback
//! model of an event-driven QUIC socket:
//!
//! - **Peek** (non-consuming): the transport reports the bytes currently
//!   buffered for a stream without advancing its read cursor.
//! - **Read** (consuming): the transport reports that data is available and
//!   the owner pulls and consumes it.
//! - **Expired / Rejected**: with partial reliability, ranges of a stream may
//!   be reported as expired (sender gave up) or rejected (receiver gave up)
//!   instead of being delivered.
//!
//! # Threading Model
//!
//! All callbacks run on the connection's event thread. Handlers are shared
//! through `Rc` and take `&self`; implementations use interior mutability.
//! Nothing here is `Send`.
//!
//! # Zero-Copy
//!
//! Peeked payload uses `bytes::Bytes` (reference-counted). Repeated peeks of
//! the same range share the same allocation.

mod router;

pub use router::{RouterError, StreamRouter};

use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

/// Unique identifier for a stream within a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

impl StreamId {
    /// Check if this is a client-initiated stream.
    pub fn is_client_initiated(&self) -> bool {
        (self.0 & 0x1) == 0
    }

    /// Check if this is a server-initiated stream.
    pub fn is_server_initiated(&self) -> bool {
        !self.is_client_initiated()
    }

    /// Check if this is a bidirectional stream.
    pub fn is_bidirectional(&self) -> bool {
        (self.0 & 0x2) == 0
    }

    /// Check if this is a unidirectional stream.
    pub fn is_unidirectional(&self) -> bool {
        !self.is_bidirectional()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier carried by a server push stream after its type preface.
pub type PushId = u64;

/// Errors raised locally by the transport rather than received from the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalErrorCode {
    /// The stream was closed before the read completed.
    StreamClosed,
    /// The peer reset the stream.
    StreamReset,
    /// The connection is closing or closed.
    ConnectionClosed,
    /// Transport bug.
    Internal,
}

/// Error code attached to a [`ReadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Application protocol error code (RESET_STREAM, CONNECTION_CLOSE 0x1d).
    Application(u64),
    /// Transport error code (CONNECTION_CLOSE 0x1c).
    Transport(u64),
    /// Error raised by the local transport.
    Local(LocalErrorCode),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Application(code) => write!(f, "application error 0x{:x}", code),
            ErrorCode::Transport(code) => write!(f, "transport error 0x{:x}", code),
            ErrorCode::Local(code) => write!(f, "local error {:?}", code),
        }
    }
}

/// Error reported instead of further data for a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadError {
    pub code: ErrorCode,
    /// Human-readable reason, if the transport has one.
    pub reason: Option<Cow<'static, str>>,
}

impl ReadError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, reason: None }
    }

    pub fn with_reason(code: ErrorCode, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            reason: Some(reason.into()),
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {}", self.code, reason),
            None => write!(f, "{}", self.code),
        }
    }
}

/// A contiguous run of buffered stream bytes, as seen through a peek.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeekChunk {
    /// Absolute stream offset of `data[0]`.
    pub offset: u64,
    /// Zero-copy payload.
    pub data: Bytes,
    /// True if the stream ends at `offset + data.len()`.
    pub fin: bool,
}

impl PeekChunk {
    pub fn new(offset: u64, data: impl Into<Bytes>, fin: bool) -> Self {
        Self {
            offset,
            data: data.into(),
            fin,
        }
    }

    /// Absolute offset one past the last byte of this chunk.
    pub fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }
}

/// Non-consuming view over the bytes currently buffered for a stream.
///
/// Chunks are ordered by offset. Successive views for the same stream may
/// overlap or extend earlier ones.
pub type PeekData<'a> = &'a [PeekChunk];

/// Non-consuming reader for a stream.
pub trait PeekCallback {
    /// Buffered bytes changed for `id`.
    fn on_data_available(&self, id: StreamId, data: PeekData<'_>);

    /// The stream failed before the bytes could be consumed.
    fn on_peek_error(&self, id: StreamId, error: &ReadError);
}

/// Consuming reader for a stream.
pub trait ReadCallback {
    /// Data is available to be read (and consumed) on `id`.
    fn read_available(&self, id: StreamId);

    /// The stream failed; no further data will be delivered.
    fn read_error(&self, id: StreamId, error: &ReadError);
}

/// Partial reliability: the sender abandoned data below `offset`.
pub trait DataExpiredCallback {
    fn on_data_expired(&self, id: StreamId, offset: u64);
}

/// Partial reliability: the receiver gave up on data below `offset`.
pub trait DataRejectedCallback {
    fn on_data_rejected(&self, id: StreamId, offset: u64);
}

/// The set of handlers that take over a stream on a peek hand-off.
///
/// A partially reliable stream stays on the peek API, so whoever receives it
/// must also receive its expired/rejected notifications.
#[derive(Clone)]
pub struct PeekHandlers {
    pub peek: Rc<dyn PeekCallback>,
    pub expired: Rc<dyn DataExpiredCallback>,
    pub rejected: Rc<dyn DataRejectedCallback>,
}

impl PeekHandlers {
    /// Use one object for all three roles.
    pub fn from_shared<T>(handler: Rc<T>) -> Self
    where
        T: PeekCallback + DataExpiredCallback + DataRejectedCallback + 'static,
    {
        Self {
            peek: handler.clone(),
            expired: handler.clone(),
            rejected: handler,
        }
    }
}

impl fmt::Debug for PeekHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeekHandlers").finish_non_exhaustive()
    }
}
