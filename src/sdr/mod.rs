//! Native RTL-SDR capture and AIS demodulation
//!
//! This module recovers AIS frames from raw baseband samples:
//! 1. Capture interleaved IQ bytes from rtl_sdr, one fixed cycle at a time
//! 2. Map bytes onto complex samples
//! 3. Differential (delay-conjugate-multiply) demodulation to hard bits
//! 4. Scan for the NRZI-decoded preamble at every bit offset
//! 5. Unwrap matching candidates down to a byte-aligned payload

pub mod capture;
mod complex;
mod demod;
mod detect;

pub use capture::{CaptureStats, SdrCapture, SdrConfig};
pub use complex::{norm_sqr_sum, Complex};
pub use demod::{estimate_frequency_offset, iq_to_complex, Demodulator};
pub use detect::{AisDetector, DetectorStats, FramingConfig, BITS_PER_GROUP, PREAMBLE_PATTERN};
