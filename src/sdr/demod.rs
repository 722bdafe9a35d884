//! Differential demodulation of complex baseband samples
//!
//! RTL-SDR outputs 8-bit unsigned IQ samples (I, Q pairs). They map directly
//! onto complex components, and bits are recovered with a delay-and-
//! conjugate-multiply phase detector: the argument of conj(x[i]) * x[i - D]
//! is the phase drop over one symbol period, whose sign is the bit decision.
//! No absolute phase or frequency reference is needed.

use super::complex::{Complex, PHASOR_GAIN};

/// Convert interleaved I/Q bytes to complex samples.
///
/// Direct byte-to-component mapping, no scaling or recentering; a trailing
/// unpaired byte is ignored.
pub fn iq_to_complex(iq: &[u8]) -> Vec<Complex> {
    iq.chunks_exact(2)
        .map(|pair| Complex::new(pair[0] as f32, pair[1] as f32))
        .collect()
}

/// Delay-conjugate-multiply demodulator with a fixed symbol delay.
#[derive(Debug, Clone, Copy)]
pub struct Demodulator {
    time_delay: usize,
}

impl Demodulator {
    pub fn new(time_delay: usize) -> Self {
        Self { time_delay }
    }

    /// Copy of `input` delayed by the symbol period: the first `time_delay`
    /// entries are zero, entry i >= time_delay equals input[i - time_delay].
    pub fn delay_vector(&self, input: &[Complex]) -> Vec<Complex> {
        let mut delayed = vec![Complex::ZERO; input.len()];
        for i in self.time_delay..input.len() {
            delayed[i] = input[i - self.time_delay];
        }
        delayed
    }

    /// Demodulate `buffer` into hard bit decisions.
    ///
    /// The buffer is consumed as scratch: each sample is replaced in place by
    /// the product of its conjugate with the delayed signal, then the product
    /// is sampled once per symbol period starting at 2·time_delay − 1. A
    /// buffer of N samples yields N/time_delay − 2 bits (time_delay | N).
    /// All-zero input demodulates to all-zero bits.
    pub fn demodulate(&self, buffer: &mut [Complex]) -> Vec<u8> {
        let delayed = self.delay_vector(buffer);
        for (sample, past) in buffer.iter_mut().zip(&delayed) {
            *sample = sample.conj().mul(*past);
        }

        let mut bits = Vec::with_capacity(buffer.len() / self.time_delay);
        let mut i = 2 * self.time_delay - 1;
        while i + self.time_delay < buffer.len() {
            bits.push(u8::from(buffer[i].arg() > 0.0));
            i += self.time_delay;
        }
        bits
    }
}

/// Estimate the residual carrier offset as the mean per-sample phase
/// increment, in Hz. Increments are averaged as phasors, not as wrapped
/// angles, so a noisy buffer still gives a stable estimate.
pub fn estimate_frequency_offset(samples: &[Complex], sample_rate: f32) -> f32 {
    let mut acc = Complex::ZERO;
    for pair in samples.windows(2) {
        acc = acc.add(pair[0].conj().mul(pair[1]));
    }
    acc.arg() * sample_rate / (2.0 * std::f32::consts::PI)
}

/// Rotate the buffer by -offset_hz, removing a carrier offset in place.
pub fn compensate_frequency_offset(samples: &mut [Complex], offset_hz: f32, sample_rate: f32) {
    for (n, sample) in samples.iter_mut().enumerate() {
        let rotor = Complex::unit_phasor(offset_hz, n as f32 / sample_rate);
        let rotated = sample.mul(rotor);
        // unit_phasor carries the fixed gain; divide it back out
        *sample = Complex::new(rotated.re / PHASOR_GAIN, rotated.im / PHASOR_GAIN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tone at a constant phase step per sample, amplitude 100.
    fn phase_ramp(len: usize, step: f32) -> Vec<Complex> {
        (0..len)
            .map(|n| {
                let phase = step * n as f32;
                Complex::new(100.0 * phase.cos(), 100.0 * phase.sin())
            })
            .collect()
    }

    #[test]
    fn test_iq_to_complex_direct_mapping() {
        let samples = iq_to_complex(&[0, 255, 127, 128, 9]);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], Complex::new(0.0, 255.0));
        assert_eq!(samples[1], Complex::new(127.0, 128.0));
    }

    #[test]
    fn test_delay_vector() {
        let demod = Demodulator::new(3);
        let input: Vec<Complex> = (0..8).map(|n| Complex::new(n as f32, -(n as f32))).collect();
        let delayed = demod.delay_vector(&input);
        assert_eq!(delayed.len(), input.len());
        for entry in &delayed[..3] {
            assert_eq!(*entry, Complex::ZERO);
        }
        for i in 3..input.len() {
            assert_eq!(delayed[i], input[i - 3]);
        }
    }

    #[test]
    fn test_demodulate_output_length() {
        let demod = Demodulator::new(4);
        let mut buffer = vec![Complex::new(1.0, 0.0); 64];
        let bits = demod.demodulate(&mut buffer);
        assert_eq!(bits.len(), 64 / 4 - 2);
    }

    #[test]
    fn test_demodulate_all_zero_input() {
        // arg(0) = 0, never > 0, so every decision is 0
        let demod = Demodulator::new(5);
        let mut buffer = vec![Complex::ZERO; 50];
        let bits = demod.demodulate(&mut buffer);
        assert_eq!(bits, vec![0; 50 / 5 - 2]);
    }

    #[test]
    fn test_demodulate_phase_slope_sign() {
        let demod = Demodulator::new(4);
        // Falling phase: conj(x[i]) * x[i-D] has positive argument -> 1s
        let mut falling = phase_ramp(64, -0.2);
        assert_eq!(demod.demodulate(&mut falling), vec![1; 14]);
        // Rising phase -> 0s
        let mut rising = phase_ramp(64, 0.2);
        assert_eq!(demod.demodulate(&mut rising), vec![0; 14]);
    }

    #[test]
    fn test_frequency_offset_estimate_and_compensate() {
        let sample_rate = 96_000.0;
        let offset_hz = 1200.0;
        let step = 2.0 * std::f32::consts::PI * offset_hz / sample_rate;
        let mut samples = phase_ramp(512, step);

        let estimated = estimate_frequency_offset(&samples, sample_rate);
        assert!((estimated - offset_hz).abs() < 1.0, "estimated {estimated}");

        compensate_frequency_offset(&mut samples, estimated, sample_rate);
        let residual = estimate_frequency_offset(&samples, sample_rate);
        assert!(residual.abs() < 1.0, "residual {residual}");
    }
}
