//! Complex baseband sample type and arithmetic
//!
//! The demodulator works on complex samples built directly from the
//! receiver's interleaved I/Q bytes. Operations here are pure value
//! arithmetic; no allocation, no failure modes.

/// A complex baseband sample (I + jQ).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: f32,
    pub im: f32,
}

/// Magnitude applied by [`Complex::unit_phasor`] so that phasor products stay
/// well above rounding noise in downstream comparisons. Callers that need a
/// calibrated magnitude divide it back out.
pub const PHASOR_GAIN: f32 = 1000.0;

impl Complex {
    pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };

    pub fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    /// Component-wise sum.
    pub fn add(self, other: Complex) -> Complex {
        Complex::new(self.re + other.re, self.im + other.im)
    }

    /// Component-wise difference.
    pub fn sub(self, other: Complex) -> Complex {
        Complex::new(self.re - other.re, self.im - other.im)
    }

    /// Complex product.
    pub fn mul(self, other: Complex) -> Complex {
        Complex::new(
            self.re * other.re - self.im * other.im,
            self.im * other.re + self.re * other.im,
        )
    }

    /// Complex conjugate.
    pub fn conj(self) -> Complex {
        Complex::new(self.re, -self.im)
    }

    /// Squared magnitude (re² + im²), avoids the sqrt.
    pub fn norm_sqr(self) -> f32 {
        self.re * self.re + self.im * self.im
    }

    /// Phase angle in radians, range (-π, π]. At the origin this follows
    /// `atan2(0, 0)` and returns 0.
    pub fn arg(self) -> f32 {
        self.im.atan2(self.re)
    }

    /// Phasor at phase -2π·frequency·time, magnitude [`PHASOR_GAIN`].
    pub fn unit_phasor(frequency: f32, time: f32) -> Complex {
        let phase = -2.0 * std::f32::consts::PI * frequency * time;
        Complex::new(phase.cos() * PHASOR_GAIN, phase.sin() * PHASOR_GAIN)
    }
}

/// Sum of squared magnitudes over a sample sequence (signal energy).
pub fn norm_sqr_sum(samples: &[Complex]) -> f32 {
    samples.iter().map(|s| s.norm_sqr()).sum()
}
