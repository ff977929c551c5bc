//! Session stand-in that performs hand-offs against a `StreamRouter` and
//! records what happened to each stream.

use hqd_unidir::{DispatchError, DispatchSink, UnidirectionalStreamType};
use hqd_x::{PeekData, PeekHandlers, PushId, ReadCallback, ReadError, StreamId, StreamRouter};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum Decision {
    Read {
        stream_type: UnidirectionalStreamType,
        preface_len: usize,
        body: usize,
        fin: bool,
    },
    Peek {
        stream_type: UnidirectionalStreamType,
        preface_len: usize,
        body: usize,
    },
    Push {
        push_id: PushId,
        preface_len: usize,
    },
    Rejected,
    Refused(DispatchError),
    Failed(String),
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Read {
                stream_type,
                preface_len,
                body,
                fin,
            } => {
                write!(f, "{stream_type} (read), preface {preface_len} byte(s), {body} body byte(s)")?;
                if *fin {
                    f.write_str(", finished")?;
                }
                Ok(())
            }
            Decision::Peek {
                stream_type,
                preface_len,
                body,
            } => write!(
                f,
                "{stream_type} (peek), preface {preface_len} byte(s), {body} body byte(s)"
            ),
            Decision::Push {
                push_id,
                preface_len,
            } => write!(f, "push {push_id}, preface {preface_len} byte(s)"),
            Decision::Rejected => f.write_str("rejected"),
            Decision::Refused(err) => write!(f, "refused: {err}"),
            Decision::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

pub struct ClassifySink {
    router: Rc<StreamRouter>,
    partial_reliability: bool,
    decisions: RefCell<BTreeMap<StreamId, Decision>>,
}

impl ClassifySink {
    pub fn new(router: Rc<StreamRouter>, partial_reliability: bool) -> Self {
        Self {
            router,
            partial_reliability,
            decisions: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn record(&self, id: StreamId, decision: Decision) {
        self.decisions.borrow_mut().insert(id, decision);
    }

    pub fn take_decisions(&self) -> BTreeMap<StreamId, Decision> {
        std::mem::take(&mut *self.decisions.borrow_mut())
    }

    fn fail(&self, id: StreamId, reason: impl fmt::Display) {
        warn!(stream_id = %id, %reason, "hand-off failed");
        self.record(id, Decision::Failed(reason.to_string()));
    }

    fn add_body(&self, id: StreamId, len: usize, finished: bool) {
        match self.decisions.borrow_mut().get_mut(&id) {
            Some(Decision::Read { body, fin, .. }) => {
                *body += len;
                *fin |= finished;
            }
            Some(Decision::Peek { body, .. }) => *body += len,
            _ => {}
        }
    }
}

impl DispatchSink for ClassifySink {
    fn parse_stream_preface(&self, preface: u64) -> Option<UnidirectionalStreamType> {
        UnidirectionalStreamType::from_preface(preface)
    }

    fn is_partial_reliability_enabled(&self, _id: StreamId) -> bool {
        self.partial_reliability
    }

    fn assign_peek_callback(
        &self,
        id: StreamId,
        stream_type: UnidirectionalStreamType,
        to_consume: usize,
        handlers: PeekHandlers,
    ) {
        self.record(
            id,
            Decision::Peek {
                stream_type,
                preface_len: to_consume,
                body: 0,
            },
        );
        let installed = self
            .router
            .consume(id, to_consume)
            .and_then(|_| self.router.set_peek_handlers(id, handlers))
            .and_then(|_| self.router.notify(id));
        if let Err(err) = installed {
            self.fail(id, err);
        }
    }

    fn assign_read_callback(
        &self,
        id: StreamId,
        stream_type: UnidirectionalStreamType,
        to_consume: usize,
        callback: Rc<dyn ReadCallback>,
    ) {
        self.record(
            id,
            Decision::Read {
                stream_type,
                preface_len: to_consume,
                body: 0,
                fin: false,
            },
        );
        let installed = self
            .router
            .clear_peek_handlers(id)
            .and_then(|_| self.router.consume(id, to_consume))
            .and_then(|_| self.router.set_read_callback(id, Some(callback)))
            .and_then(|_| self.router.notify(id));
        if let Err(err) = installed {
            self.fail(id, err);
        }
    }

    fn on_new_push_stream(&self, id: StreamId, push_id: PushId, to_consume: usize) {
        self.record(
            id,
            Decision::Push {
                push_id,
                preface_len: to_consume,
            },
        );
        let installed = self
            .router
            .clear_peek_handlers(id)
            .and_then(|_| self.router.consume(id, to_consume));
        if let Err(err) = installed {
            self.fail(id, err);
        }
    }

    fn reject_stream(&self, id: StreamId) {
        self.record(id, Decision::Rejected);
        if let Err(err) = self.router.clear_peek_handlers(id) {
            self.fail(id, err);
        }
    }

    fn control_stream_read_available(&self, id: StreamId) {
        match self.router.read(id, usize::MAX) {
            Ok((data, fin)) => self.add_body(id, data.len(), fin),
            Err(err) => self.fail(id, err),
        }
    }

    fn control_stream_read_error(&self, id: StreamId, error: &ReadError) {
        self.fail(id, error);
    }

    fn on_partial_data_available(&self, id: StreamId, data: PeekData<'_>) {
        let len: usize = data.iter().map(|chunk| chunk.data.len()).sum();
        if len == 0 {
            return;
        }
        match self.router.consume(id, len) {
            Ok(()) => self.add_body(id, len, false),
            Err(err) => self.fail(id, err),
        }
    }

    fn process_expired_data(&self, id: StreamId, offset: u64) {
        tracing::debug!(stream_id = %id, offset, "side channel data expired");
    }

    fn process_rejected_data(&self, id: StreamId, offset: u64) {
        tracing::debug!(stream_id = %id, offset, "side channel data rejected");
    }

    fn report_internal_error(&self, error: &DispatchError) {
        tracing::error!(%error, "dispatcher reported an internal error");
    }
}
