//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use hqd_unidir::{DispatchError, DispatchSink, DispatcherConfig, UnidirStreamDispatcher, UnidirectionalStreamType};
use hqd_x::{PeekChunk, PeekData, PeekHandlers, PushId, ReadCallback, ReadError, StreamId, StreamRouter};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Every call the dispatcher (or a forwarder) made on the sink, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    AssignPeek {
        id: StreamId,
        stream_type: UnidirectionalStreamType,
        to_consume: usize,
    },
    AssignRead {
        id: StreamId,
        stream_type: UnidirectionalStreamType,
        to_consume: usize,
    },
    Push {
        id: StreamId,
        push_id: PushId,
        to_consume: usize,
    },
    Reject(StreamId),
    ControlReadAvailable(StreamId),
    ControlReadError(StreamId),
    PartialData { id: StreamId, len: usize },
    Expired { id: StreamId, offset: u64 },
    Rejected { id: StreamId, offset: u64 },
    InternalError(DispatchError),
}

pub type Registry = fn(u64) -> Option<UnidirectionalStreamType>;

/// Sink that records its calls. When built with a router it also performs
/// the transport side of each hand-off, the way a session would.
pub struct RecordingSink {
    pub calls: RefCell<Vec<SinkCall>>,
    pub read_callbacks: RefCell<Vec<Rc<dyn ReadCallback>>>,
    pub control_bytes: RefCell<Vec<u8>>,
    pub partial_reliability: Cell<bool>,
    registry: Registry,
    router: Option<Rc<StreamRouter>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::with_registry(UnidirectionalStreamType::from_preface)
    }
}

impl RecordingSink {
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            read_callbacks: RefCell::new(Vec::new()),
            control_bytes: RefCell::new(Vec::new()),
            partial_reliability: Cell::new(false),
            registry,
            router: None,
        }
    }

    pub fn with_router(router: Rc<StreamRouter>) -> Self {
        Self {
            router: Some(router),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.borrow().clone()
    }

    pub fn hand_offs(&self, id: StreamId) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| match call {
                SinkCall::AssignPeek { id: i, .. }
                | SinkCall::AssignRead { id: i, .. }
                | SinkCall::Push { id: i, .. } => *i == id,
                SinkCall::Reject(i) => *i == id,
                _ => false,
            })
            .count()
    }

    fn push(&self, call: SinkCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl DispatchSink for RecordingSink {
    fn parse_stream_preface(&self, preface: u64) -> Option<UnidirectionalStreamType> {
        (self.registry)(preface)
    }

    fn is_partial_reliability_enabled(&self, _id: StreamId) -> bool {
        self.partial_reliability.get()
    }

    fn assign_peek_callback(
        &self,
        id: StreamId,
        stream_type: UnidirectionalStreamType,
        to_consume: usize,
        handlers: PeekHandlers,
    ) {
        self.push(SinkCall::AssignPeek {
            id,
            stream_type,
            to_consume,
        });
        if let Some(router) = &self.router {
            router.consume(id, to_consume).unwrap();
            router.set_peek_handlers(id, handlers).unwrap();
            router.notify(id).unwrap();
        }
    }

    fn assign_read_callback(
        &self,
        id: StreamId,
        stream_type: UnidirectionalStreamType,
        to_consume: usize,
        callback: Rc<dyn ReadCallback>,
    ) {
        self.push(SinkCall::AssignRead {
            id,
            stream_type,
            to_consume,
        });
        self.read_callbacks.borrow_mut().push(callback.clone());
        if let Some(router) = &self.router {
            router.clear_peek_handlers(id).unwrap();
            router.consume(id, to_consume).unwrap();
            router.set_read_callback(id, Some(callback)).unwrap();
            router.notify(id).unwrap();
        }
    }

    fn on_new_push_stream(&self, id: StreamId, push_id: PushId, to_consume: usize) {
        self.push(SinkCall::Push {
            id,
            push_id,
            to_consume,
        });
        if let Some(router) = &self.router {
            router.clear_peek_handlers(id).unwrap();
            router.consume(id, to_consume).unwrap();
        }
    }

    fn reject_stream(&self, id: StreamId) {
        self.push(SinkCall::Reject(id));
        if let Some(router) = &self.router {
            router.clear_peek_handlers(id).unwrap();
        }
    }

    fn control_stream_read_available(&self, id: StreamId) {
        self.push(SinkCall::ControlReadAvailable(id));
        if let Some(router) = &self.router {
            let (data, _fin) = router.read(id, usize::MAX).unwrap();
            self.control_bytes.borrow_mut().extend_from_slice(&data);
        }
    }

    fn control_stream_read_error(&self, id: StreamId, _error: &ReadError) {
        self.push(SinkCall::ControlReadError(id));
    }

    fn on_partial_data_available(&self, id: StreamId, data: PeekData<'_>) {
        let len: usize = data.iter().map(|chunk| chunk.data.len()).sum();
        if len > 0 {
            self.push(SinkCall::PartialData { id, len });
        }
    }

    fn process_expired_data(&self, id: StreamId, offset: u64) {
        self.push(SinkCall::Expired { id, offset });
    }

    fn process_rejected_data(&self, id: StreamId, offset: u64) {
        self.push(SinkCall::Rejected { id, offset });
    }

    fn report_internal_error(&self, error: &DispatchError) {
        self.push(SinkCall::InternalError(*error));
    }
}

pub fn dispatcher_with(
    sink: RecordingSink,
    config: DispatcherConfig,
) -> (Rc<RecordingSink>, Rc<UnidirStreamDispatcher<RecordingSink>>) {
    let sink = Rc::new(sink);
    let dispatcher = Rc::new(UnidirStreamDispatcher::new(sink.clone(), config));
    (sink, dispatcher)
}

pub fn dispatcher() -> (Rc<RecordingSink>, Rc<UnidirStreamDispatcher<RecordingSink>>) {
    dispatcher_with(RecordingSink::default(), DispatcherConfig::default())
}

/// A peek view holding `bytes` from stream offset 0.
pub fn view(bytes: &[u8], fin: bool) -> Vec<PeekChunk> {
    vec![PeekChunk::new(0, Bytes::copy_from_slice(bytes), fin)]
}

/// Varint-encode `values` back to back.
pub fn encode(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in values {
        hqd_unidir::varint::encode_buf(*v, &mut out).unwrap();
    }
    out
}
