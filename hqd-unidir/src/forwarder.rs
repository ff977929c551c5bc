//! Pass-through handlers installed on a stream once its type is known.
//!
//! Both forwarders are created once per dispatcher and shared by every
//! stream they are handed to. They hold the sink weakly: the sink usually
//! keeps the handlers it was given, and the transport may keep them alive
//! after the connection is gone.

use crate::dispatcher::DispatchSink;
use hqd_x::{
    DataExpiredCallback, DataRejectedCallback, PeekCallback, PeekData, ReadCallback, ReadError,
    StreamId,
};
use std::rc::Weak;
use tracing::trace;

/// Consuming reader for control streams (and read-registered codec side
/// channels). Forwards availability and errors to the sink verbatim.
pub struct ControlStreamForwarder<S: ?Sized> {
    sink: Weak<S>,
}

impl<S: ?Sized> ControlStreamForwarder<S> {
    pub fn new(sink: Weak<S>) -> Self {
        Self { sink }
    }
}

impl<S: DispatchSink + ?Sized> ReadCallback for ControlStreamForwarder<S> {
    fn read_available(&self, id: StreamId) {
        match self.sink.upgrade() {
            Some(sink) => sink.control_stream_read_available(id),
            None => trace!(stream_id = %id, "sink gone, dropping read event"),
        }
    }

    fn read_error(&self, id: StreamId, error: &ReadError) {
        match self.sink.upgrade() {
            Some(sink) => sink.control_stream_read_error(id, error),
            None => trace!(stream_id = %id, %error, "sink gone, dropping read error"),
        }
    }
}

/// Peek-side handler for partially reliable codec side channels.
///
/// After a peek hand-off the transport routes peek, expired and rejected
/// events for the stream here, and the dispatcher is no longer involved.
/// A peek error is reported through `control_stream_read_error`, the same
/// path a read-registered side channel uses.
pub struct PartialDataForwarder<S: ?Sized> {
    sink: Weak<S>,
}

impl<S: ?Sized> PartialDataForwarder<S> {
    pub fn new(sink: Weak<S>) -> Self {
        Self { sink }
    }
}

impl<S: DispatchSink + ?Sized> PeekCallback for PartialDataForwarder<S> {
    fn on_data_available(&self, id: StreamId, data: PeekData<'_>) {
        if let Some(sink) = self.sink.upgrade() {
            sink.on_partial_data_available(id, data);
        }
    }

    fn on_peek_error(&self, id: StreamId, error: &ReadError) {
        if let Some(sink) = self.sink.upgrade() {
            sink.control_stream_read_error(id, error);
        }
    }
}

impl<S: DispatchSink + ?Sized> DataExpiredCallback for PartialDataForwarder<S> {
    fn on_data_expired(&self, id: StreamId, offset: u64) {
        if let Some(sink) = self.sink.upgrade() {
            sink.process_expired_data(id, offset);
        }
    }
}

impl<S: DispatchSink + ?Sized> DataRejectedCallback for PartialDataForwarder<S> {
    fn on_data_rejected(&self, id: StreamId, offset: u64) {
        if let Some(sink) = self.sink.upgrade() {
            sink.process_rejected_data(id, offset);
        }
    }
}
