//! Unidirectional stream type identification per RFC 9114 Section 6.2.
//!
//! Each unidirectional stream begins with a variable-length integer indicating
//! the stream type. This module holds the closed set of types the dispatcher
//! hands off and the default HTTP/3 code registry.

use crate::error::VarintError;
use crate::varint;
use bytes::BufMut;
use std::fmt;

/// HTTP/3 control stream (RFC 9114 Section 6.2.1).
pub const STREAM_TYPE_CONTROL: u64 = 0x00;
/// HTTP/3 push stream (RFC 9114 Section 6.2.2).
pub const STREAM_TYPE_PUSH: u64 = 0x01;
/// QPACK encoder stream (RFC 9204 Section 4.2).
pub const STREAM_TYPE_QPACK_ENCODER: u64 = 0x02;
/// QPACK decoder stream (RFC 9204 Section 4.2).
pub const STREAM_TYPE_QPACK_DECODER: u64 = 0x03;

/// Role of a unidirectional stream, as announced by its preface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnidirectionalStreamType {
    /// Carries connection-level frames (SETTINGS, GOAWAY, etc.).
    Control,

    /// Carries a server push response. The type is followed by a push ID.
    Push,

    /// Header codec encoder instructions (QPACK encoder stream).
    CodecEncoderSideChannel,

    /// Header codec decoder instructions (QPACK decoder stream).
    CodecDecoderSideChannel,
}

impl UnidirectionalStreamType {
    /// Default HTTP/3 registry. Unknown and reserved codes map to `None`.
    pub fn from_preface(code: u64) -> Option<Self> {
        match code {
            STREAM_TYPE_CONTROL => Some(Self::Control),
            STREAM_TYPE_PUSH => Some(Self::Push),
            STREAM_TYPE_QPACK_ENCODER => Some(Self::CodecEncoderSideChannel),
            STREAM_TYPE_QPACK_DECODER => Some(Self::CodecDecoderSideChannel),
            _ => None,
        }
    }

    /// Preface code of this type in the default HTTP/3 registry.
    pub fn preface(&self) -> u64 {
        match self {
            Self::Control => STREAM_TYPE_CONTROL,
            Self::Push => STREAM_TYPE_PUSH,
            Self::CodecEncoderSideChannel => STREAM_TYPE_QPACK_ENCODER,
            Self::CodecDecoderSideChannel => STREAM_TYPE_QPACK_DECODER,
        }
    }

    /// Codec side channels carry header-compression state, not HTTP frames.
    pub fn is_codec_side_channel(&self) -> bool {
        matches!(
            self,
            Self::CodecEncoderSideChannel | Self::CodecDecoderSideChannel
        )
    }
}

impl fmt::Display for UnidirectionalStreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Control => "control",
            Self::Push => "push",
            Self::CodecEncoderSideChannel => "codec-encoder",
            Self::CodecDecoderSideChannel => "codec-decoder",
        };
        f.write_str(name)
    }
}

/// Check if a stream type code is a grease/reserved value (0x1f * N + 0x21).
/// Per RFC 9114 Section 6.2.3, these MUST be ignored.
pub fn is_grease(code: u64) -> bool {
    code >= 0x21 && (code - 0x21) % 0x1f == 0
}

/// Write the preface of a unidirectional stream: the type code and, for
/// push streams, the push ID.
///
/// Returns the number of bytes written.
pub fn write_stream_preface(
    stream_type: UnidirectionalStreamType,
    push_id: Option<u64>,
    buf: &mut impl BufMut,
) -> Result<usize, VarintError> {
    let mut written = varint::encode_buf(stream_type.preface(), buf)?;
    if let (UnidirectionalStreamType::Push, Some(push_id)) = (stream_type, push_id) {
        written += varint::encode_buf(push_id, buf)?;
    }
    Ok(written)
}
