//! In-memory, single-connection stream transport.
//!
//! `StreamRouter` buffers received bytes per stream, tracks the consumed
//! offset, and routes every event to whichever handler is currently
//! registered for the stream. It implements the same registration contract
//! a QUIC socket exposes: one peek reader, one consuming reader, and
//! optional expired/rejected handlers, each scoped to a stream id.
//!
//! No internal borrow is held while a handler runs, so handlers may change
//! registrations or consume bytes from inside a callback.

use crate::{
    DataExpiredCallback, DataRejectedCallback, PeekCallback, PeekChunk, PeekHandlers,
    ReadCallback, ReadError, StreamId,
};
use bytes::{Buf, Bytes, BytesMut};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;
use tracing::trace;

/// Errors returned by [`StreamRouter`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("stream {0} is already open")]
    StreamExists(StreamId),

    #[error("stream {0} does not exist")]
    StreamNotFound(StreamId),

    #[error("stream {id}: cannot consume {requested} bytes, {available} buffered")]
    InsufficientData {
        id: StreamId,
        requested: usize,
        available: usize,
    },

    #[error("stream {0} already received FIN")]
    StreamFinished(StreamId),
}

#[derive(Default)]
struct RouterStream {
    /// Unconsumed bytes, starting at `read_offset`.
    buffer: BytesMut,
    read_offset: u64,
    fin: bool,
    peek: Option<Rc<dyn PeekCallback>>,
    read: Option<Rc<dyn ReadCallback>>,
    expired: Option<Rc<dyn DataExpiredCallback>>,
    rejected: Option<Rc<dyn DataRejectedCallback>>,
}

impl RouterStream {
    fn peek_view(&self) -> PeekChunk {
        PeekChunk {
            offset: self.read_offset,
            data: Bytes::copy_from_slice(&self.buffer),
            fin: self.fin,
        }
    }
}

/// Single-threaded stream transport with per-stream handler registration.
#[derive(Default)]
pub struct StreamRouter {
    streams: RefCell<HashMap<StreamId, RouterStream>>,
}

impl StreamRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface a new stream. No handler is registered yet.
    pub fn open_stream(&self, id: StreamId) -> Result<(), RouterError> {
        let mut streams = self.streams.borrow_mut();
        if streams.contains_key(&id) {
            return Err(RouterError::StreamExists(id));
        }
        streams.insert(id, RouterStream::default());
        Ok(())
    }

    /// Forget a stream and drop every handler registered for it.
    pub fn close_stream(&self, id: StreamId) -> Result<(), RouterError> {
        self.streams
            .borrow_mut()
            .remove(&id)
            .map(|_| ())
            .ok_or(RouterError::StreamNotFound(id))
    }

    pub fn set_peek_callback(
        &self,
        id: StreamId,
        callback: Option<Rc<dyn PeekCallback>>,
    ) -> Result<(), RouterError> {
        self.with_stream(id, |s| s.peek = callback)
    }

    pub fn set_read_callback(
        &self,
        id: StreamId,
        callback: Option<Rc<dyn ReadCallback>>,
    ) -> Result<(), RouterError> {
        self.with_stream(id, |s| s.read = callback)
    }

    /// Install a complete set of peek-side handlers in one step.
    pub fn set_peek_handlers(&self, id: StreamId, handlers: PeekHandlers) -> Result<(), RouterError> {
        self.with_stream(id, |s| {
            s.peek = Some(handlers.peek);
            s.expired = Some(handlers.expired);
            s.rejected = Some(handlers.rejected);
        })
    }

    /// Remove the peek-side handlers (peek, expired, rejected).
    pub fn clear_peek_handlers(&self, id: StreamId) -> Result<(), RouterError> {
        self.with_stream(id, |s| {
            s.peek = None;
            s.expired = None;
            s.rejected = None;
        })
    }

    /// Advance the read cursor by `amount` bytes without returning them.
    pub fn consume(&self, id: StreamId, amount: usize) -> Result<(), RouterError> {
        let mut streams = self.streams.borrow_mut();
        let stream = streams.get_mut(&id).ok_or(RouterError::StreamNotFound(id))?;
        if stream.buffer.len() < amount {
            return Err(RouterError::InsufficientData {
                id,
                requested: amount,
                available: stream.buffer.len(),
            });
        }
        stream.buffer.advance(amount);
        stream.read_offset += amount as u64;
        trace!(stream_id = %id, amount, offset = stream.read_offset, "consumed");
        Ok(())
    }

    /// Consuming read of up to `max_len` bytes. Returns the data and whether
    /// the stream is finished after it.
    pub fn read(&self, id: StreamId, max_len: usize) -> Result<(Bytes, bool), RouterError> {
        let mut streams = self.streams.borrow_mut();
        let stream = streams.get_mut(&id).ok_or(RouterError::StreamNotFound(id))?;
        let len = max_len.min(stream.buffer.len());
        let data = stream.buffer.split_to(len).freeze();
        stream.read_offset += len as u64;
        Ok((data, stream.fin && stream.buffer.is_empty()))
    }

    /// Absolute offset of the next unconsumed byte.
    pub fn read_offset(&self, id: StreamId) -> Result<u64, RouterError> {
        self.streams
            .borrow()
            .get(&id)
            .map(|s| s.read_offset)
            .ok_or(RouterError::StreamNotFound(id))
    }

    /// Append bytes received from the peer and notify the registered readers.
    pub fn receive(&self, id: StreamId, data: &[u8], fin: bool) -> Result<(), RouterError> {
        {
            let mut streams = self.streams.borrow_mut();
            let stream = streams.get_mut(&id).ok_or(RouterError::StreamNotFound(id))?;
            if stream.fin {
                return Err(RouterError::StreamFinished(id));
            }
            stream.buffer.extend_from_slice(data);
            stream.fin = fin;
        }
        self.notify(id)
    }

    /// Re-deliver the current buffer state to the registered readers.
    ///
    /// A peek reader gets the full unconsumed view; a consuming reader gets
    /// `read_available` if there is data or a pending FIN.
    pub fn notify(&self, id: StreamId) -> Result<(), RouterError> {
        let (peek, read, view) = {
            let streams = self.streams.borrow();
            let stream = streams.get(&id).ok_or(RouterError::StreamNotFound(id))?;
            let readable = !stream.buffer.is_empty() || stream.fin;
            (
                stream.peek.clone(),
                stream.read.clone().filter(|_| readable),
                stream.peek_view(),
            )
        };
        if let Some(peek) = peek {
            peek.on_data_available(id, std::slice::from_ref(&view));
        }
        if let Some(read) = read {
            read.read_available(id);
        }
        Ok(())
    }

    /// The sender abandoned everything below `offset`.
    ///
    /// The read cursor moves to `offset`, so later peek views start there.
    /// On a stream whose preface was never classified this means the
    /// preface can no longer be seen from offset 0; the expired handler is
    /// told and decides what happens to the stream.
    pub fn expire(&self, id: StreamId, offset: u64) -> Result<(), RouterError> {
        let expired = {
            let mut streams = self.streams.borrow_mut();
            let stream = streams.get_mut(&id).ok_or(RouterError::StreamNotFound(id))?;
            if offset > stream.read_offset {
                let skip = ((offset - stream.read_offset) as usize).min(stream.buffer.len());
                stream.buffer.advance(skip);
                stream.read_offset = offset;
            }
            stream.expired.clone()
        };
        if let Some(expired) = expired {
            expired.on_data_expired(id, offset);
        }
        Ok(())
    }

    /// The receiver gave up on everything below `offset`.
    pub fn reject(&self, id: StreamId, offset: u64) -> Result<(), RouterError> {
        let rejected = {
            let streams = self.streams.borrow();
            let stream = streams.get(&id).ok_or(RouterError::StreamNotFound(id))?;
            stream.rejected.clone()
        };
        if let Some(rejected) = rejected {
            rejected.on_data_rejected(id, offset);
        }
        Ok(())
    }

    /// Fail the stream: every registered reader is told exactly once.
    pub fn fail(&self, id: StreamId, error: ReadError) -> Result<(), RouterError> {
        let (peek, read) = {
            let streams = self.streams.borrow();
            let stream = streams.get(&id).ok_or(RouterError::StreamNotFound(id))?;
            (stream.peek.clone(), stream.read.clone())
        };
        if let Some(peek) = peek {
            peek.on_peek_error(id, &error);
        }
        if let Some(read) = read {
            read.read_error(id, &error);
        }
        Ok(())
    }

    fn with_stream<F>(&self, id: StreamId, f: F) -> Result<(), RouterError>
    where
        F: FnOnce(&mut RouterStream),
    {
        let mut streams = self.streams.borrow_mut();
        let stream = streams.get_mut(&id).ok_or(RouterError::StreamNotFound(id))?;
        f(stream);
        Ok(())
    }
}
