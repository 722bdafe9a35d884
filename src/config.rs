//! Configuration loaded from environment variables

use crate::sdr::{FramingConfig, SdrConfig};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// RTL-SDR device index
    pub device_index: u32,

    /// Device ID string for identification
    pub device_id: String,

    /// Tuner gain in dB (use 0 for auto)
    pub gain_db: f32,

    /// PPM frequency correction
    pub ppm_error: i32,

    /// Path to rtl_sdr executable
    pub rtl_sdr_path: String,

    /// AIS channel center frequency in Hz
    pub center_freq: u32,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Complex samples per acquisition cycle
    pub size_signal: usize,

    /// Demodulator symbol delay in samples
    pub time_delay: usize,

    /// Estimate and remove the residual carrier before demodulating
    pub compensate_offset: bool,

    /// Signal metrics reporting interval in milliseconds
    pub signal_report_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = FramingConfig::default();

        Self {
            device_index: std::env::var("DEVICE_INDEX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),

            device_id: std::env::var("DEVICE_ID")
                .unwrap_or_else(|_| "RTL-SDR-AIS-0".to_string()),

            gain_db: std::env::var("DEVICE_GAIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0), // automatic gain

            ppm_error: std::env::var("PPM_ERROR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),

            rtl_sdr_path: std::env::var("RTL_SDR_PATH")
                .unwrap_or_else(|_| "rtl_sdr".to_string()),

            center_freq: std::env::var("CENTER_FREQ")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(162_025_000), // AIS channel 2 (87B)

            sample_rate: std::env::var("SAMPLE_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sample_rate),

            size_signal: std::env::var("SIZE_SIGNAL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.size_signal),

            time_delay: std::env::var("TIME_DELAY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.time_delay),

            compensate_offset: std::env::var("COMPENSATE_OFFSET")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),

            signal_report_interval_ms: std::env::var("SIGNAL_REPORT_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5000),
        }
    }

    /// Protocol framing geometry for the detector.
    pub fn framing(&self) -> FramingConfig {
        FramingConfig {
            size_signal: self.size_signal,
            time_delay: self.time_delay,
            sample_rate: self.sample_rate,
            compensate_offset: self.compensate_offset,
            ..FramingConfig::default()
        }
    }

    /// Device parameters for the capture process.
    pub fn sdr(&self) -> SdrConfig {
        SdrConfig {
            device_index: self.device_index,
            center_freq: self.center_freq,
            sample_rate: self.sample_rate,
            gain: (self.gain_db * 10.0) as i32, // tenths of dB
            ppm_error: self.ppm_error,
            rtl_sdr_path: self.rtl_sdr_path.clone(),
        }
    }
}
