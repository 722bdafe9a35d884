//! RTL-SDR capture via rtl_sdr process
//!
//! Spawns rtl_sdr tuned to the AIS channel, reads one acquisition cycle of
//! raw IQ bytes at a time (2 * size_signal bytes), and runs each cycle
//! through the AIS detector. The decoding core never touches the device;
//! this module is the only acquisition boundary.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::detect::{AisDetector, FramingConfig};
use crate::ais::DecodedFrame;

/// RTL-SDR configuration
#[derive(Clone)]
pub struct SdrConfig {
    pub device_index: u32,
    pub center_freq: u32,
    pub sample_rate: u32,
    pub gain: i32, // Gain in tenths of dB (0 = automatic)
    pub ppm_error: i32,
    pub rtl_sdr_path: String,
}

impl Default for SdrConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            center_freq: 162_025_000, // AIS channel 2 (87B)
            sample_rate: 960_000,     // 100 samples per 9600 bit/s symbol
            gain: 0,
            ppm_error: 0,
            rtl_sdr_path: "rtl_sdr".to_string(),
        }
    }
}

/// Statistics for SDR capture (atomic for thread-safe access)
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub samples_captured: AtomicU64,
    pub cycles_processed: AtomicU64,
    pub preambles_detected: AtomicU64,
    pub frames_decoded: AtomicU64,
    pub validation_failures: AtomicU64,
    pub crc_failures: AtomicU64,
}

impl CaptureStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// RTL-SDR capture controller
pub struct SdrCapture {
    config: SdrConfig,
    framing: FramingConfig,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl SdrCapture {
    pub fn new(config: SdrConfig, framing: FramingConfig) -> Self {
        Self {
            config,
            framing,
            running: Arc::new(AtomicBool::new(false)),
            stats: CaptureStats::new(),
        }
    }

    /// Start capturing and return a receiver for decoded frames.
    pub fn start(&self) -> Result<Receiver<DecodedFrame>> {
        self.framing.validate()?;

        info!("===========================================");
        info!("  Starting RTL-SDR Raw IQ Capture");
        info!("===========================================");
        info!("  Device index: {}", self.config.device_index);
        info!("  Center frequency: {} kHz", self.config.center_freq / 1_000);
        info!("  Sample rate: {} kSPS", self.config.sample_rate / 1_000);
        info!("  Samples per cycle: {}", self.framing.size_signal);
        info!("  Symbol delay: {} samples", self.framing.time_delay);
        info!("  rtl_sdr path: {}", self.config.rtl_sdr_path);

        let (frame_tx, frame_rx) = bounded::<DecodedFrame>(1000);

        let config = self.config.clone();
        let framing = self.framing.clone();
        let running = self.running.clone();
        let stats = self.stats.clone();

        running.store(true, Ordering::SeqCst);

        thread::Builder::new()
            .name("sdr-capture".to_string())
            .spawn(move || {
                if let Err(e) = run_capture(config, framing, running, stats, frame_tx) {
                    error!("SDR capture error: {}", e);
                }
            })
            .context("Failed to spawn capture thread")?;

        Ok(frame_rx)
    }

    /// Stop capturing
    pub fn stop(&self) {
        info!("Stopping RTL-SDR capture...");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get statistics
    pub fn stats(&self) -> &Arc<CaptureStats> {
        &self.stats
    }
}

/// Main capture loop (runs in dedicated thread)
fn run_capture(
    config: SdrConfig,
    framing: FramingConfig,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
    frame_tx: Sender<DecodedFrame>,
) -> Result<()> {
    info!("Starting rtl_sdr process for raw IQ capture...");

    // rtl_sdr -d <device> -f <freq> -s <rate> [-g <gain>] [-p <ppm>] -
    // The "-" at the end means output to stdout
    let mut cmd = Command::new(&config.rtl_sdr_path);
    cmd.arg("-d").arg(config.device_index.to_string())
        .arg("-f").arg(config.center_freq.to_string())
        .arg("-s").arg(config.sample_rate.to_string());

    if config.gain != 0 {
        cmd.arg("-g").arg((config.gain as f32 / 10.0).to_string());
    }
    if config.ppm_error != 0 {
        cmd.arg("-p").arg(config.ppm_error.to_string());
    }

    cmd.arg("-");
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    info!("Executing: {:?}", cmd);

    let mut child = cmd
        .spawn()
        .context("Failed to spawn rtl_sdr. Make sure rtl_sdr is installed and in PATH")?;

    let mut stdout = child
        .stdout
        .take()
        .context("Failed to capture rtl_sdr stdout")?;

    // Relay rtl_sdr stderr into our logs
    if let Some(stderr) = child.stderr.take() {
        thread::spawn(move || {
            let mut reader = std::io::BufReader::new(stderr);
            let mut line = String::new();
            while std::io::BufRead::read_line(&mut reader, &mut line).unwrap_or(0) > 0 {
                if !line.trim().is_empty() {
                    info!("[rtl_sdr] {}", line.trim());
                }
                line.clear();
            }
        });
    }

    let mut detector = AisDetector::new(framing.clone());

    // One acquisition cycle: interleaved I/Q byte pairs
    let cycle_bytes = 2 * framing.size_signal;
    let mut buffer = vec![0u8; cycle_bytes];

    let mut last_stats_time = Instant::now();
    let mut last_sample_count = 0u64;
    let mut first_data = true;

    while running.load(Ordering::SeqCst) {
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {
                if first_data {
                    info!("First IQ data received! ({} bytes per cycle)", cycle_bytes);
                    first_data = false;
                }

                let frames = detector.process_buffer(&buffer);

                for frame in frames {
                    info!(
                        ">>> FRAME: type={:02} | {} bits | offset={} | crc_ok={} | *{};",
                        frame.message_type,
                        frame.payload.len(),
                        frame.bit_offset,
                        frame.crc_ok,
                        frame.to_hex()
                    );

                    if frame_tx.try_send(frame).is_err() {
                        debug!("Frame channel full, dropping frame");
                    }
                }

                stats
                    .samples_captured
                    .store(detector.stats.samples_processed, Ordering::Relaxed);
                stats
                    .cycles_processed
                    .store(detector.stats.cycles_processed, Ordering::Relaxed);
                stats
                    .preambles_detected
                    .store(detector.stats.preambles_detected, Ordering::Relaxed);
                stats
                    .frames_decoded
                    .store(detector.stats.frames_decoded, Ordering::Relaxed);
                stats
                    .validation_failures
                    .store(detector.stats.validation_failures, Ordering::Relaxed);
                stats
                    .crc_failures
                    .store(detector.stats.crc_failures, Ordering::Relaxed);

                // Periodic stats logging (every 5 seconds)
                if last_stats_time.elapsed() >= Duration::from_secs(5) {
                    let current_samples = stats.samples_captured.load(Ordering::Relaxed);
                    let samples_delta = current_samples - last_sample_count;
                    let elapsed = last_stats_time.elapsed().as_secs_f32();

                    info!(
                        "[SDR Stats] Rate: {:.0} kSPS | Preambles: {} | Frames: {} | Bad type: {} | CRC failures: {}",
                        samples_delta as f32 / elapsed / 1_000.0,
                        detector.stats.preambles_detected,
                        detector.stats.frames_decoded,
                        detector.stats.validation_failures,
                        detector.stats.crc_failures
                    );

                    last_stats_time = Instant::now();
                    last_sample_count = current_samples;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                warn!("rtl_sdr stdout closed (EOF)");
                break;
            }
            Err(e) => {
                error!("Error reading from rtl_sdr: {}", e);
                thread::sleep(Duration::from_millis(100));
            }
        }
    }

    let _ = child.kill();

    info!("RTL-SDR capture stopped");
    info!(
        "Final stats: Samples={}, Preambles={}, Frames={}, Bad type={}, CRC failures={}",
        detector.stats.samples_processed,
        detector.stats.preambles_detected,
        detector.stats.frames_decoded,
        detector.stats.validation_failures,
        detector.stats.crc_failures
    );

    Ok(())
}

impl Drop for SdrCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
