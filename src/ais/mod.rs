//! AIS frame recovery: bit transforms, checksum, field extraction

pub mod bits;
pub mod crc;
pub mod fields;
mod types;

pub use fields::{extract_field, message_type, POSITION_REPORT_TYPE};
pub use types::{DecodeError, DecodedFrame};
