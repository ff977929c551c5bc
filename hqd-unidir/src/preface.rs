//! Stream preface parsing.
//!
//! A unidirectional stream starts with a varint type code; push streams add
//! a varint push ID right after it. The parser works on a non-consuming view
//! of the stream, always measured from stream offset 0, and can be resumed
//! as the view grows. Nothing is consumed until the caller acts on a
//! [`Preface`].

use crate::stream_type::UnidirectionalStreamType;
use crate::varint;
use hqd_x::{PeekData, PushId};

/// Longest possible preface: type code plus push ID.
pub const MAX_PREFACE_LEN: usize = 2 * varint::MAX_LEN;

/// The first bytes of a stream, gathered from a peek view.
///
/// Only bytes contiguous from offset 0 are kept; anything after a gap is
/// ignored until the gap is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefaceBytes {
    buf: [u8; MAX_PREFACE_LEN],
    len: usize,
    /// Contiguous length of the stream covered by the view.
    covered: u64,
    /// The stream ends at `covered`.
    fin: bool,
}

impl PrefaceBytes {
    pub fn from_view(view: PeekData<'_>) -> Self {
        let mut bytes = Self {
            buf: [0u8; MAX_PREFACE_LEN],
            len: 0,
            covered: 0,
            fin: false,
        };

        for chunk in view {
            if chunk.offset > bytes.covered {
                break;
            }
            let chunk_end = chunk.end();
            if chunk_end > bytes.covered {
                let fresh = &chunk.data[(bytes.covered - chunk.offset) as usize..];
                let n = fresh.len().min(MAX_PREFACE_LEN - bytes.len);
                bytes.buf[bytes.len..bytes.len + n].copy_from_slice(&fresh[..n]);
                bytes.len += n;
                bytes.covered = chunk_end;
            }
            if chunk.fin && chunk_end == bytes.covered {
                bytes.fin = true;
            }
        }
        bytes
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn covered(&self) -> u64 {
        self.covered
    }

    /// No byte beyond `covered()` will ever arrive.
    pub fn is_fin(&self) -> bool {
        self.fin
    }
}

/// A fully parsed preface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preface {
    /// A non-push stream type known to the registry.
    Stream {
        stream_type: UnidirectionalStreamType,
        len: usize,
    },
    /// A push stream with its push ID.
    Push { push_id: PushId, len: usize },
    /// The registry has no mapping for `code`.
    Unknown { code: u64, len: usize },
}

impl Preface {
    /// Bytes the eventual owner must consume to skip the preface.
    pub fn byte_len(&self) -> usize {
        match self {
            Preface::Stream { len, .. } | Preface::Push { len, .. } | Preface::Unknown { len, .. } => {
                *len
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefaceProgress {
    /// More bytes are needed; nothing is consumed.
    Incomplete,
    Complete(Preface),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    AwaitingType,
    /// Push type decoded from the first `type_len` bytes.
    AwaitingPushId { type_len: usize },
}

/// Resumable preface parser for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefaceParser {
    state: ParseState,
}

impl Default for PrefaceParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefaceParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::AwaitingType,
        }
    }

    /// True once a push type code has been seen and only the push ID is missing.
    pub fn is_awaiting_push_id(&self) -> bool {
        matches!(self.state, ParseState::AwaitingPushId { .. })
    }

    /// Try to complete the preface from `bytes`, which must start at stream
    /// offset 0.
    ///
    /// `classify` maps a type code to a stream type. It is called at most
    /// once over the life of the parser.
    pub fn advance<F>(&mut self, bytes: &[u8], classify: F) -> PrefaceProgress
    where
        F: FnOnce(u64) -> Option<UnidirectionalStreamType>,
    {
        let type_len = match self.state {
            ParseState::AwaitingPushId { type_len } => type_len,
            ParseState::AwaitingType => {
                let Some((code, len)) = varint::peek(bytes) else {
                    return PrefaceProgress::Incomplete;
                };
                match classify(code) {
                    None => return PrefaceProgress::Complete(Preface::Unknown { code, len }),
                    Some(UnidirectionalStreamType::Push) => {
                        self.state = ParseState::AwaitingPushId { type_len: len };
                        len
                    }
                    Some(stream_type) => {
                        return PrefaceProgress::Complete(Preface::Stream { stream_type, len });
                    }
                }
            }
        };

        match bytes.get(type_len..).and_then(varint::peek) {
            Some((push_id, n)) => PrefaceProgress::Complete(Preface::Push {
                push_id,
                len: type_len + n,
            }),
            None => PrefaceProgress::Incomplete,
        }
    }
}
