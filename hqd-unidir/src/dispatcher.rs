//! Unidirectional stream dispatcher.
//!
//! Every unidirectional stream arrives without a type. The dispatcher takes
//! temporary ownership of each new stream, registers as its non-consuming
//! (peek) reader, and parses the preface as bytes arrive. Once the preface
//! is complete it performs exactly one hand-off to the sink and forgets the
//! stream:
//!
//! ```text
//!   New ──take──▶ Pending ──preface──┬──▶ ControlAssigned      (read callback)
//!                   │  ▲             ├──▶ PushDiscovered       (sink owns)
//!                   └──┘ incomplete  ├──▶ SideChannelAssigned  (read or peek)
//!                                    └──▶ Rejected             (unknown type)
//! ```
//!
//! The dispatcher never consumes bytes and never touches the transport. The
//! hand-off tells the sink how many bytes to consume (`to_consume`, measured
//! from stream offset 0) and which handler to install; the sink drops the
//! dispatcher's peek registration and installs the new one.
//!
//! # Threading
//!
//! Single-threaded. All methods take `&self`; no `RefCell` borrow is held
//! across a sink call, so the sink may call back into the dispatcher from
//! inside a hand-off.

use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::forwarder::{ControlStreamForwarder, PartialDataForwarder};
use crate::preface::{Preface, PrefaceBytes, PrefaceParser, PrefaceProgress};
use crate::stream_type::UnidirectionalStreamType;
use hqd_x::{
    DataExpiredCallback, DataRejectedCallback, PeekCallback, PeekData, PeekHandlers, PushId,
    ReadCallback, ReadError, StreamId,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, error, trace, warn};

/// Receiver of the dispatcher's decisions.
///
/// Implemented by the component that owns HTTP semantics for the
/// connection. Methods take `&self`; implementations use interior
/// mutability.
pub trait DispatchSink {
    /// Map a preface code to a stream type. Pure; `None` means unknown.
    fn parse_stream_preface(&self, preface: u64) -> Option<UnidirectionalStreamType>;

    /// Whether `id` uses partial reliability and must stay on the peek API.
    fn is_partial_reliability_enabled(&self, _id: StreamId) -> bool {
        false
    }

    /// Hand-off to a peek reader. The sink replaces the dispatcher's peek
    /// registration with `handlers` and skips `to_consume` preface bytes.
    fn assign_peek_callback(
        &self,
        id: StreamId,
        stream_type: UnidirectionalStreamType,
        to_consume: usize,
        handlers: PeekHandlers,
    );

    /// Hand-off to a consuming reader. The sink drops the dispatcher's peek
    /// registration, consumes `to_consume` bytes and installs `callback`.
    fn assign_read_callback(
        &self,
        id: StreamId,
        stream_type: UnidirectionalStreamType,
        to_consume: usize,
        callback: Rc<dyn ReadCallback>,
    );

    /// A push stream was identified. The sink becomes its owner and installs
    /// its own reader.
    fn on_new_push_stream(&self, id: StreamId, push_id: PushId, to_consume: usize);

    /// The stream cannot be used; the sink is expected to reset it.
    fn reject_stream(&self, id: StreamId);

    fn control_stream_read_available(&self, id: StreamId);

    fn control_stream_read_error(&self, id: StreamId, error: &ReadError);

    fn on_partial_data_available(&self, id: StreamId, data: PeekData<'_>);

    fn process_expired_data(&self, id: StreamId, offset: u64);

    fn process_rejected_data(&self, id: StreamId, offset: u64);

    /// An internal-consistency fault was detected: a leaked or duplicated
    /// stream registration, or a peek event for a stream the dispatcher
    /// does not own. Debug builds also panic.
    fn report_internal_error(&self, _error: &DispatchError) {}
}

/// Classification state of a stream the dispatcher owns.
#[derive(Debug, Clone, Copy)]
struct PendingStream {
    parser: PrefaceParser,
    /// Contiguous bytes seen so far, from offset 0.
    covered: u64,
}

impl PendingStream {
    fn new() -> Self {
        Self {
            parser: PrefaceParser::new(),
            covered: 0,
        }
    }
}

/// Routes new unidirectional streams to their handlers by preface.
pub struct UnidirStreamDispatcher<S: DispatchSink + ?Sized + 'static> {
    sink: Rc<S>,
    config: DispatcherConfig,
    control_forwarder: Rc<ControlStreamForwarder<S>>,
    partial_forwarder: Rc<PartialDataForwarder<S>>,
    pending: RefCell<HashMap<StreamId, PendingStream>>,
}

impl<S: DispatchSink + ?Sized + 'static> UnidirStreamDispatcher<S> {
    pub fn new(sink: Rc<S>, config: DispatcherConfig) -> Self {
        let control_forwarder = Rc::new(ControlStreamForwarder::new(Rc::downgrade(&sink)));
        let partial_forwarder = Rc::new(PartialDataForwarder::new(Rc::downgrade(&sink)));
        Self {
            sink,
            config,
            control_forwarder,
            partial_forwarder,
            pending: RefCell::new(HashMap::new()),
        }
    }

    /// The consuming reader handed out for control streams. Every call
    /// returns the same instance.
    pub fn control_stream_callback(&self) -> Rc<dyn ReadCallback> {
        self.control_forwarder.clone()
    }

    /// The peek-side handlers handed out for partially reliable side
    /// channels. Every call returns the same instance.
    pub fn partial_data_handlers(&self) -> PeekHandlers {
        PeekHandlers::from_shared(self.partial_forwarder.clone())
    }

    /// Handlers to register with the transport for a pending stream.
    pub fn peek_handlers(self: &Rc<Self>) -> PeekHandlers {
        PeekHandlers::from_shared(self.clone())
    }

    /// Take temporary ownership of a newly surfaced stream.
    ///
    /// Ownership ends when the stream is handed to the sink or released.
    pub fn take_temporary_ownership(&self, id: StreamId) -> Result<(), DispatchError> {
        let refused = {
            let mut pending = self.pending.borrow_mut();
            if pending.contains_key(&id) {
                Some(DispatchError::AlreadyOwned(id))
            } else if let Some(limit) = self.config.pending_limit().filter(|l| pending.len() >= *l) {
                Some(DispatchError::TooManyPendingStreams { id, limit })
            } else {
                pending.insert(id, PendingStream::new());
                None
            }
        };

        match refused {
            None => {
                trace!(stream_id = %id, "took temporary ownership");
                Ok(())
            }
            Some(err @ DispatchError::AlreadyOwned(_)) => {
                self.contract_violation(err);
                Err(err)
            }
            Some(err) => {
                warn!(stream_id = %id, %err, "refusing unidirectional stream");
                Err(err)
            }
        }
    }

    pub fn has_ownership(&self, id: StreamId) -> bool {
        self.pending.borrow().contains_key(&id)
    }

    /// Release ownership of a pending stream without handing it off.
    ///
    /// Every release must match an earlier, still-active take.
    pub fn release_ownership(&self, id: StreamId) -> Result<StreamId, DispatchError> {
        let found = self.pending.borrow_mut().remove(&id).is_some();
        if !found {
            let err = DispatchError::NotOwned(id);
            self.contract_violation(err);
            return Err(err);
        }
        Ok(id)
    }

    /// Number of streams whose type is not yet known.
    pub fn number_of_streams(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Apply `f` to every pending stream id, in ascending order.
    ///
    /// The ids are snapshotted first, so `f` may release ownership.
    pub fn invoke_on_pending_stream_ids<F>(&self, mut f: F)
    where
        F: FnMut(StreamId),
    {
        let mut ids: Vec<StreamId> = self.pending.borrow().keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            f(id);
        }
    }

    fn contract_violation(&self, err: DispatchError) {
        error!(%err, "stream ownership contract violated");
        self.sink.report_internal_error(&err);
        if cfg!(debug_assertions) {
            panic!("{}", err);
        }
    }

    fn hand_off(&self, id: StreamId, preface: Preface) {
        if self.release_ownership(id).is_err() {
            return;
        }

        let to_consume = preface.byte_len();
        match preface {
            Preface::Unknown { code, .. } => {
                warn!(stream_id = %id, code, preface_len = to_consume, "unknown stream type, rejecting");
                self.sink.reject_stream(id);
            }
            Preface::Push { push_id, .. } => {
                debug!(stream_id = %id, push_id, preface_len = to_consume, "push stream");
                self.sink.on_new_push_stream(id, push_id, to_consume);
            }
            Preface::Stream { stream_type, .. }
                if stream_type.is_codec_side_channel()
                    && self.sink.is_partial_reliability_enabled(id) =>
            {
                debug!(stream_id = %id, %stream_type, preface_len = to_consume, "side channel, peek hand-off");
                self.sink
                    .assign_peek_callback(id, stream_type, to_consume, self.partial_data_handlers());
            }
            Preface::Stream { stream_type, .. } => {
                debug!(stream_id = %id, %stream_type, preface_len = to_consume, "read hand-off");
                self.sink
                    .assign_read_callback(id, stream_type, to_consume, self.control_stream_callback());
            }
        }
    }

    fn reject_pending(&self, id: StreamId) {
        if self.release_ownership(id).is_ok() {
            self.sink.reject_stream(id);
        }
    }
}

impl<S: DispatchSink + ?Sized + 'static> PeekCallback for UnidirStreamDispatcher<S> {
    fn on_data_available(&self, id: StreamId, data: PeekData<'_>) {
        let pending = self.pending.borrow().get(&id).copied();
        let Some(mut stream) = pending else {
            self.contract_violation(DispatchError::UnknownStream(id));
            return;
        };

        let bytes = PrefaceBytes::from_view(data);
        if bytes.covered() <= stream.covered && !bytes.is_fin() {
            trace!(stream_id = %id, covered = stream.covered, "no new preface bytes");
            return;
        }
        stream.covered = stream.covered.max(bytes.covered());

        let sink = &self.sink;
        match stream
            .parser
            .advance(bytes.as_slice(), |code| sink.parse_stream_preface(code))
        {
            PrefaceProgress::Complete(preface) => self.hand_off(id, preface),
            PrefaceProgress::Incomplete if bytes.is_fin() && self.config.reject_truncated_prefaces => {
                warn!(stream_id = %id, covered = stream.covered, "stream ended inside its preface, rejecting");
                self.reject_pending(id);
            }
            PrefaceProgress::Incomplete => {
                trace!(stream_id = %id, covered = stream.covered, "preface incomplete");
                if let Some(entry) = self.pending.borrow_mut().get_mut(&id) {
                    *entry = stream;
                }
            }
        }
    }

    fn on_peek_error(&self, id: StreamId, error: &ReadError) {
        if !self.has_ownership(id) {
            debug!(stream_id = %id, %error, "peek error for unowned stream");
            self.contract_violation(DispatchError::UnknownStream(id));
            return;
        }
        warn!(stream_id = %id, %error, "stream failed before its type was known, rejecting");
        self.reject_pending(id);
    }
}

impl<S: DispatchSink + ?Sized + 'static> DataExpiredCallback for UnidirStreamDispatcher<S> {
    fn on_data_expired(&self, id: StreamId, offset: u64) {
        if self.has_ownership(id) {
            self.sink.process_expired_data(id, offset);
        } else {
            debug!(stream_id = %id, offset, "dropping stale data-expired event");
        }
    }
}

impl<S: DispatchSink + ?Sized + 'static> DataRejectedCallback for UnidirStreamDispatcher<S> {
    fn on_data_rejected(&self, id: StreamId, offset: u64) {
        if self.has_ownership(id) {
            self.sink.process_rejected_data(id, offset);
        } else {
            debug!(stream_id = %id, offset, "dropping stale data-rejected event");
        }
    }
}
