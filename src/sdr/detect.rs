//! AIS preamble detection and frame extraction
//!
//! AIS packet structure on air (GMSK/NRZI at 9600 bit/s):
//! - Ramp-up: 8 bits
//! - Training sequence: 24 alternating bits
//! - Start flag: 0x7E (01111110)
//! - Data: position report bits, stuffed, CRC-16 at the end
//! - End flag + buffer
//!
//! The demodulated stream is scanned one bit offset at a time; each 256-bit
//! candidate is NRZI-inverted with fresh line state and its bits [8, 40)
//! compared against the training-plus-flag pattern. A match drives the
//! transform chain down to a byte-aligned payload whose message-type field is
//! validated.

use anyhow::{bail, Result};
use tracing::{trace, warn};

use super::complex::Complex;
use super::demod::{compensate_frequency_offset, estimate_frequency_offset, iq_to_complex, Demodulator};
use crate::ais::{self, bits, crc, DecodeError, DecodedFrame};

/// Demodulated bits per frame candidate.
pub const BITS_PER_GROUP: usize = 256;

/// Position of the synchronization pattern inside a candidate (after the
/// ramp-up bits).
const PREAMBLE_OFFSET: usize = 8;

/// NRZI-decoded synchronization pattern: 24 training bits (alternating 0/1)
/// followed by the 0x7E start flag.
pub const PREAMBLE_PATTERN: [u8; 32] = [
    0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1,
    0, 1, 1, 1, 1, 1, 1, 0,
];

/// Protocol framing geometry, injected at startup.
#[derive(Debug, Clone)]
pub struct FramingConfig {
    /// Complex samples per acquisition cycle.
    pub size_signal: usize,
    /// Demodulator delay in samples (one symbol period).
    pub time_delay: usize,
    /// Ramp-up + training + start flag, in bits.
    pub size_preamble_flag: usize,
    /// End flag + buffer, in bits.
    pub size_end_flag: usize,
    /// CRC width in bits.
    pub size_checksum: usize,
    /// Synchronization pattern compared at bits [8, 40) of each candidate.
    pub preamble: [u8; 32],
    /// Sample rate in Hz (used by carrier-offset compensation).
    pub sample_rate: u32,
    /// Estimate and remove the residual carrier before demodulating.
    pub compensate_offset: bool,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            // 960 kSPS at 9600 bit/s: 100 samples per symbol, 1022 bits per cycle
            size_signal: 102_400,
            time_delay: 100,
            size_preamble_flag: 40,
            size_end_flag: 32,
            size_checksum: crc::CRC_WIDTH,
            preamble: PREAMBLE_PATTERN,
            sample_rate: 960_000,
            compensate_offset: false,
        }
    }
}

impl FramingConfig {
    /// Demodulated bits produced per acquisition cycle.
    pub fn bits_per_cycle(&self) -> usize {
        self.size_signal / self.time_delay - 2
    }

    /// Reject geometry that cannot hold a single frame candidate.
    pub fn validate(&self) -> Result<()> {
        if self.time_delay == 0 {
            bail!("time_delay must be at least 1 sample");
        }
        if self.size_signal % self.time_delay != 0 {
            bail!(
                "size_signal {} is not a multiple of time_delay {}",
                self.size_signal,
                self.time_delay
            );
        }
        if self.size_signal / self.time_delay < BITS_PER_GROUP + 2 {
            bail!(
                "acquisition cycle of {} samples yields fewer than {} demodulated bits",
                self.size_signal,
                BITS_PER_GROUP
            );
        }
        if self.size_preamble_flag + self.size_end_flag >= BITS_PER_GROUP {
            bail!("framing overhead leaves no data bits in a candidate");
        }
        if BITS_PER_GROUP - self.size_preamble_flag - self.size_end_flag <= self.size_checksum {
            bail!("checksum width leaves no payload bits in a candidate");
        }
        Ok(())
    }
}

/// Detector statistics, reset with the detector.
#[derive(Debug, Default)]
pub struct DetectorStats {
    pub samples_processed: u64,
    pub cycles_processed: u64,
    pub preambles_detected: u64,
    pub frames_decoded: u64,
    pub validation_failures: u64,
    pub crc_failures: u64,
    pub decode_errors: u64,
}

/// AIS detector - scans demodulated bit streams for frames.
pub struct AisDetector {
    config: FramingConfig,
    demod: Demodulator,
    /// Sample counter for frame timestamps.
    sample_counter: u64,
    pub stats: DetectorStats,
}

impl AisDetector {
    pub fn new(config: FramingConfig) -> Self {
        let demod = Demodulator::new(config.time_delay);
        Self {
            config,
            demod,
            sample_counter: 0,
            stats: DetectorStats::default(),
        }
    }

    pub fn config(&self) -> &FramingConfig {
        &self.config
    }

    /// Process one acquisition cycle of interleaved I/Q bytes.
    pub fn process_buffer(&mut self, iq_data: &[u8]) -> Vec<DecodedFrame> {
        self.process_samples(iq_to_complex(iq_data))
    }

    /// Process one acquisition cycle of complex samples.
    ///
    /// The buffer is owned and consumed here: demodulation uses it as
    /// scratch and it is released when the cycle ends.
    pub fn process_samples(&mut self, mut samples: Vec<Complex>) -> Vec<DecodedFrame> {
        if self.config.compensate_offset {
            let sample_rate = self.config.sample_rate as f32;
            let offset_hz = estimate_frequency_offset(&samples, sample_rate);
            compensate_frequency_offset(&mut samples, offset_hz, sample_rate);
            trace!("carrier offset estimate: {:.1} Hz", offset_hz);
        }

        let cycle_start = self.sample_counter;
        let num_samples = samples.len();
        let stream = self.demod.demodulate(&mut samples);
        drop(samples);

        let frames = self.scan(&stream, cycle_start);

        self.sample_counter += num_samples as u64;
        self.stats.samples_processed += num_samples as u64;
        self.stats.cycles_processed += 1;
        frames
    }

    /// Try every offset of the demodulated stream that still holds a full
    /// candidate. No skip-ahead after a match: frames may start at any bit
    /// offset, so every position is checked independently.
    fn scan(&mut self, stream: &[u8], cycle_start: u64) -> Vec<DecodedFrame> {
        let mut frames = Vec::new();
        if stream.len() < BITS_PER_GROUP {
            return frames;
        }

        for offset in 0..=stream.len() - BITS_PER_GROUP {
            let mut candidate = stream[offset..offset + BITS_PER_GROUP].to_vec();
            bits::nrzi_inv(&mut candidate);

            let window = &candidate[PREAMBLE_OFFSET..PREAMBLE_OFFSET + self.config.preamble.len()];
            if window != &self.config.preamble[..] {
                // Synchronization miss: the expected high-frequency outcome
                continue;
            }
            self.stats.preambles_detected += 1;

            let timestamp = cycle_start + (offset * self.config.time_delay) as u64;
            match self.decode_candidate(&candidate, offset, timestamp) {
                Ok(frame) => {
                    trace!(
                        "frame at bit offset {}: type={} crc_ok={} hex={}",
                        offset,
                        frame.message_type,
                        frame.crc_ok,
                        frame.to_hex()
                    );
                    self.stats.frames_decoded += 1;
                    frames.push(frame);
                }
                Err(e) => {
                    self.stats.decode_errors += 1;
                    warn!("candidate at bit offset {} failed to decode: {}", offset, e);
                }
            }
        }

        frames
    }

    /// Run the transform chain on a synchronized, NRZI-decoded candidate.
    fn decode_candidate(
        &mut self,
        candidate: &[u8],
        offset: usize,
        timestamp_samples: u64,
    ) -> Result<DecodedFrame, DecodeError> {
        let cfg = &self.config;

        let working = BITS_PER_GROUP - cfg.size_preamble_flag - cfg.size_end_flag;
        let without_flags = bits::remove_preamble_flag(candidate, working, cfg.size_preamble_flag)?;

        let destuffed = bits::bit_stuffing_inv(&without_flags);
        if destuffed.len() < cfg.size_checksum + 8 {
            return Err(DecodeError::TruncatedCandidate {
                len: destuffed.len(),
                need: cfg.size_checksum + 8,
            });
        }

        let crc_ok = crc::verify_checksum(&destuffed).unwrap_or(false);
        let trimmed = bits::remove_checksum(&destuffed, destuffed.len() - cfg.size_checksum)?;

        let aligned = trimmed.len() / 8 * 8;
        let payload = bits::flip_bits(&trimmed[..aligned])?;

        let message_type = ais::message_type(&payload)?;
        let type_valid = message_type == ais::POSITION_REPORT_TYPE;
        if !type_valid {
            self.stats.validation_failures += 1;
            warn!(
                "unexpected message type {} at bit offset {}",
                message_type, offset
            );
        }
        if !crc_ok {
            self.stats.crc_failures += 1;
        }

        Ok(DecodedFrame {
            payload,
            message_type,
            type_valid,
            crc_ok,
            bit_offset: offset,
            timestamp_samples,
        })
    }
}

impl Default for AisDetector {
    fn default() -> Self {
        Self::new(FramingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ais::bits::flip_bits;
    use crate::ais::crc::compute_crc;
    use std::f32::consts::FRAC_PI_2;

    const RAMP_BITS: usize = 8;
    const MESSAGE_BITS: usize = 168;

    /// NRZI line coding: a transition encodes 0, a repeat encodes 1.
    fn nrzi_encode(bits: &[u8]) -> Vec<u8> {
        let mut level = 0u8;
        bits.iter()
            .map(|&b| {
                if b == 0 {
                    level ^= 1;
                }
                level
            })
            .collect()
    }

    /// Transmit-side HDLC stuffing: insert a 0 after each run of five 1s.
    fn stuff_bits(bits: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(bits.len());
        let mut run = 0usize;
        for &b in bits {
            out.push(b);
            if b == 1 {
                run += 1;
                if run == 5 {
                    out.push(0);
                    run = 0;
                }
            } else {
                run = 0;
            }
        }
        out
    }

    /// MSK-style synthesis: each line bit turns into `time_delay` samples of
    /// a ±(π/2)/time_delay phase ramp (1 = falling phase), so the detector's
    /// delay-conjugate-multiply decision recovers the line bit exactly.
    fn modulate(line_bits: &[u8], time_delay: usize) -> Vec<Complex> {
        let step = FRAC_PI_2 / time_delay as f32;
        let mut phase = 0.0f32;
        let mut samples = Vec::with_capacity(line_bits.len() * time_delay);
        for &bit in line_bits {
            let delta = if bit == 1 { -step } else { step };
            for _ in 0..time_delay {
                phase += delta;
                samples.push(Complex::new(100.0 * phase.cos(), 100.0 * phase.sin()));
            }
        }
        samples
    }

    /// A 168-bit message with the given type field and a counter spread over
    /// some mid-message bits so callers can vary the CRC.
    fn message_with_type(message_type: u8, counter: u16) -> Vec<u8> {
        let mut message = vec![0u8; MESSAGE_BITS];
        for k in 0..6 {
            message[k] = (message_type >> (5 - k)) & 1;
        }
        for k in 0..10 {
            message[100 + 2 * k] = ((counter >> k) & 1) as u8;
        }
        message
    }

    /// Flipped message plus CRC, chosen (via the counter bits) so that the
    /// on-air data needs no stuffing; keeps the 184-bit frame layout exact.
    fn build_clean_data(message_type: u8) -> (Vec<u8>, Vec<u8>) {
        for counter in 0..1024u16 {
            let message = message_with_type(message_type, counter);
            let flipped = flip_bits(&message).unwrap();
            let mut data = flipped;
            data.extend(compute_crc(&data));
            if stuff_bits(&data) == data {
                return (message, data);
            }
        }
        unreachable!("no stuff-free counter value found");
    }

    /// Full synthetic acquisition: pad bits, packet, pad bits, NRZI, MSK.
    fn synthesize(data: &[u8], pad_front: usize, pad_back: usize, time_delay: usize) -> Vec<Complex> {
        let mut packet = vec![0u8; pad_front + RAMP_BITS];
        packet.extend_from_slice(&PREAMBLE_PATTERN);
        packet.extend_from_slice(data);
        packet.extend_from_slice(&[0, 1, 1, 1, 1, 1, 1, 0]); // end flag
        packet.extend(std::iter::repeat(0).take(pad_back));
        modulate(&nrzi_encode(&packet), time_delay)
    }

    fn test_config(time_delay: usize, size_signal: usize) -> FramingConfig {
        FramingConfig {
            size_signal,
            time_delay,
            sample_rate: 9600 * time_delay as u32,
            ..FramingConfig::default()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(FramingConfig::default().validate().is_ok());

        let misaligned = FramingConfig { size_signal: 102_401, ..FramingConfig::default() };
        assert!(misaligned.validate().is_err());

        let short = FramingConfig { size_signal: 4096, time_delay: 100, ..FramingConfig::default() };
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_bits_per_cycle() {
        let cfg = FramingConfig::default();
        assert_eq!(cfg.bits_per_cycle(), 102_400 / 100 - 2);
    }

    #[test]
    fn test_no_frames_in_silence() {
        let mut detector = AisDetector::new(test_config(4, 2048));
        let frames = detector.process_samples(vec![Complex::ZERO; 2048]);
        assert!(frames.is_empty());
        assert_eq!(detector.stats.preambles_detected, 0);
        assert_eq!(detector.stats.samples_processed, 2048);
    }

    #[test]
    fn test_end_to_end_position_report() {
        let time_delay = 4;
        let (message, data) = build_clean_data(1);
        // 3 + 8 + 32 + 184 + 8 + 29 = 264 line bits -> 262 demodulated bits
        let samples = synthesize(&data, 3, 29, time_delay);
        let mut detector = AisDetector::new(test_config(time_delay, samples.len()));

        let frames = detector.process_samples(samples);
        assert_eq!(frames.len(), 1, "exactly one offset should synchronize");

        let frame = &frames[0];
        assert_eq!(frame.payload.len() % 8, 0);
        assert_eq!(frame.payload, message);
        assert_eq!(frame.message_type, 1);
        assert!(frame.type_valid);
        assert!(frame.crc_ok);
        assert_eq!(detector.stats.preambles_detected, 1);
        assert_eq!(detector.stats.frames_decoded, 1);
        assert_eq!(detector.stats.validation_failures, 0);
        assert_eq!(detector.stats.crc_failures, 0);
    }

    #[test]
    fn test_end_to_end_unexpected_type_reported_once() {
        let time_delay = 4;
        let (_, data) = build_clean_data(3);
        let samples = synthesize(&data, 3, 29, time_delay);
        let mut detector = AisDetector::new(test_config(time_delay, samples.len()));

        let frames = detector.process_samples(samples);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message_type, 3);
        assert!(!frames[0].type_valid);
        // Reported exactly once for that offset; scanning continued
        assert_eq!(detector.stats.validation_failures, 1);
    }

    #[test]
    fn test_end_to_end_stuffed_run_survives_sync() {
        // A message with a deliberate run of five 1s: the transmitter stuffs
        // it, the window shifts by one bit, and the candidate still
        // synchronizes and yields a byte-aligned payload whose leading bits
        // are intact.
        let time_delay = 4;
        let mut message = message_with_type(1, 0);
        for k in 16..21 {
            message[k] = 1;
        }
        let flipped = flip_bits(&message).unwrap();
        let mut data = flipped;
        data.extend(compute_crc(&data));
        let stuffed = stuff_bits(&data);
        assert!(stuffed.len() > data.len());

        let samples = synthesize(&stuffed, 3, 29, time_delay);
        let mut detector = AisDetector::new(test_config(time_delay, samples.len()));

        let frames = detector.process_samples(samples);
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.payload.len() % 8, 0);
        assert_eq!(frame.message_type, 1);
        assert!(frame.type_valid);
        // The first two octets precede the stuffed bit and decode untouched
        assert_eq!(frame.payload[..16], message[..16]);
    }

    #[test]
    fn test_frame_timestamp_tracks_sample_counter() {
        let time_delay = 4;
        let (_, data) = build_clean_data(1);
        let samples = synthesize(&data, 3, 29, time_delay);
        let cycle_len = samples.len();
        let mut detector = AisDetector::new(test_config(time_delay, cycle_len));

        // An empty cycle first, then the one carrying the frame
        detector.process_samples(vec![Complex::ZERO; cycle_len]);
        let frames = detector.process_samples(samples);
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(
            frame.timestamp_samples,
            cycle_len as u64 + (frame.bit_offset * time_delay) as u64
        );
        assert_eq!(detector.stats.cycles_processed, 2);
    }
}
