//! Unidirectional stream dispatch for HQ / HTTP/3.
//!
//! HTTP/3 peers open unidirectional streams whose role is only known after
//! the first bytes arrive: a varint stream type, plus a varint push ID for
//! push streams. This crate owns a stream during that window. It peeks at
//! the preface without consuming it, classifies the stream through a
//! pluggable registry, and hands it off exactly once to the session layer
//! ([`DispatchSink`]) along with the number of preface bytes to consume.
//!
//! ```no_run
//! use hqd_unidir::{DispatcherConfig, UnidirStreamDispatcher};
//! # use hqd_unidir::DispatchSink;
//! # use std::rc::Rc;
//! # fn wire<S: DispatchSink + 'static>(sink: Rc<S>, router: &hqd_x::StreamRouter) {
//! let dispatcher = Rc::new(UnidirStreamDispatcher::new(sink, DispatcherConfig::default()));
//! let id = hqd_x::StreamId(2);
//! dispatcher.take_temporary_ownership(id).unwrap();
//! router.set_peek_handlers(id, dispatcher.peek_handlers()).unwrap();
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod forwarder;
pub mod preface;
pub mod stream_type;
pub mod varint;

pub use config::{load_config_file, DispatcherConfig, HqdConfig, LoggingConfig};
pub use dispatcher::{DispatchSink, UnidirStreamDispatcher};
pub use error::{ConfigError, DispatchError, VarintError};
pub use forwarder::{ControlStreamForwarder, PartialDataForwarder};
pub use preface::{Preface, PrefaceBytes, PrefaceParser, PrefaceProgress, MAX_PREFACE_LEN};
pub use stream_type::{is_grease, write_stream_preface, UnidirectionalStreamType};
