//! AIS frame types and decode errors

use thiserror::Error;

/// Errors raised by the bit pipeline and field decoder.
///
/// Synchronization misses and message-type mismatches are expected outcomes,
/// not errors; only defensive bounds/alignment violations land here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("bit range {start}..{end} out of bounds for {len}-bit vector")]
    OutOfRange { start: usize, end: usize, len: usize },

    #[error("bit vector length {len} is not a multiple of 8")]
    NotByteAligned { len: usize },

    #[error("field width {width} exceeds the {max}-bit limit")]
    FieldTooWide { width: usize, max: usize },

    #[error("frame candidate holds {len} bits, {need} required")]
    TruncatedCandidate { len: usize, need: usize },
}

/// A synchronized, fully transformed AIS frame.
///
/// `payload` is the byte-aligned bit vector that survives the transform chain
/// (one entry per bit, MSB-first within each byte group). Frames are emitted
/// whether or not validation passed; the flags tell the host what happened.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Decoded payload bits, length a multiple of 8.
    pub payload: Vec<u8>,
    /// Value of the message-type field, bits [0, 6).
    pub message_type: i64,
    /// True when the message-type field decoded to a position report (1).
    pub type_valid: bool,
    /// True when the transmitted CRC-16 matched the recomputed one.
    pub crc_ok: bool,
    /// Offset of the frame candidate within the demodulated bit stream.
    pub bit_offset: usize,
    /// Absolute sample count at the start of the acquisition cycle.
    pub timestamp_samples: u64,
}

impl DecodedFrame {
    /// Pack the payload bits into bytes, MSB-first.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.payload
            .chunks(8)
            .map(|byte| byte.iter().fold(0u8, |acc, &b| (acc << 1) | (b & 1)))
            .collect()
    }

    /// Hex rendering of the packed payload (for logs and host output).
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.to_bytes())
    }
}
