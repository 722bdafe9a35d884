//! AIS Capture - Native RTL-SDR with differential GMSK decoder
//!
//! Captures raw IQ samples from RTL-SDR, demodulates and decodes AIS
//! position-report frames, and reports decoded frames and signal metrics
//! to the host as structured JSON log events.

mod ais;
mod config;
mod sdr;

use anyhow::Result;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::Config;

/// Host-facing record of one decoded frame.
#[derive(Debug, Serialize)]
struct FrameEvent {
    device_id: String,
    timestamp_ms: u64,
    timestamp_samples: u64,
    bit_offset: usize,
    message_type: i64,
    type_valid: bool,
    crc_ok: bool,
    payload_hex: String,
}

/// Host-facing periodic signal metrics.
#[derive(Debug, Serialize)]
struct SignalMetrics {
    device_id: String,
    timestamp_ms: u64,
    samples_processed: u64,
    cycles_processed: u64,
    preambles_detected: u64,
    frames_decoded: u64,
    validation_failures: u64,
    crc_failures: u64,
    frame_rate: f32,
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .init();

    info!("===========================================");
    info!("   AIS Capture - Native RTL-SDR");
    info!("   differential GMSK decoder in Rust");
    info!("===========================================");

    // Load configuration
    let config = Config::from_env();
    let framing = config.framing();
    if let Err(e) = framing.validate() {
        error!("Invalid acquisition geometry: {}", e);
        return Err(e);
    }

    info!("Configuration:");
    info!("  Device index: {}", config.device_index);
    info!("  Device ID: {}", config.device_id);
    info!("  Center frequency: {} Hz", config.center_freq);
    info!("  Sample rate: {} Hz", config.sample_rate);
    info!("  Gain: {} dB", config.gain_db);
    info!("  PPM error: {}", config.ppm_error);
    info!("  Samples per cycle: {}", config.size_signal);
    info!("  Symbol delay: {} samples", config.time_delay);
    info!("  Carrier compensation: {}", config.compensate_offset);

    // Reporting channels: decoded frames and periodic metrics go to a
    // host-facing task that renders them as JSON log events.
    let (event_tx, mut event_rx) = mpsc::channel::<FrameEvent>(1000);
    let (metrics_tx, mut metrics_rx) = mpsc::channel::<SignalMetrics>(100);

    let event_handle = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => info!("[frame] {}", json),
                Err(e) => error!("Failed to serialize frame event: {}", e),
            }
        }
    });

    let metrics_handle = tokio::spawn(async move {
        while let Some(metrics) = metrics_rx.recv().await {
            match serde_json::to_string(&metrics) {
                Ok(json) => info!("[signal] {}", json),
                Err(e) => error!("Failed to serialize signal metrics: {}", e),
            }
        }
    });

    // Start native SDR capture
    let sdr = sdr::SdrCapture::new(config.sdr(), framing);
    let frame_rx = match sdr.start() {
        Ok(rx) => rx,
        Err(e) => {
            error!("Failed to start SDR capture: {}", e);
            error!("Make sure the RTL-SDR device is connected and drivers are installed.");
            return Err(e);
        }
    };

    info!("===========================================");
    info!("  Starting capture...");
    info!("  Press Ctrl+C to stop.");
    info!("===========================================");

    let mut frames_processed = 0u64;
    let mut last_signal_report = Instant::now();
    let report_interval = Duration::from_millis(config.signal_report_interval_ms);

    // Main processing loop - receive decoded frames from SDR
    loop {
        match frame_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(frame) => {
                frames_processed += 1;

                if !frame.type_valid {
                    warn!(
                        "Validation failure: message type {} (expected {})",
                        frame.message_type,
                        ais::POSITION_REPORT_TYPE
                    );
                }

                let event = FrameEvent {
                    device_id: config.device_id.clone(),
                    timestamp_ms: now_ms(),
                    timestamp_samples: frame.timestamp_samples,
                    bit_offset: frame.bit_offset,
                    message_type: frame.message_type,
                    type_valid: frame.type_valid,
                    crc_ok: frame.crc_ok,
                    payload_hex: frame.to_hex(),
                };
                if let Err(e) = event_tx.send(event).await {
                    warn!("Failed to send frame event: {}", e);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // No frame received, continue with periodic tasks
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                warn!("SDR frame channel disconnected");
                break;
            }
        }

        // Periodic signal metrics
        if last_signal_report.elapsed() >= report_interval {
            let stats = sdr.stats();
            let elapsed = last_signal_report.elapsed().as_secs_f32();

            let metrics = SignalMetrics {
                device_id: config.device_id.clone(),
                timestamp_ms: now_ms(),
                samples_processed: stats.samples_captured.load(std::sync::atomic::Ordering::Relaxed),
                cycles_processed: stats.cycles_processed.load(std::sync::atomic::Ordering::Relaxed),
                preambles_detected: stats.preambles_detected.load(std::sync::atomic::Ordering::Relaxed),
                frames_decoded: stats.frames_decoded.load(std::sync::atomic::Ordering::Relaxed),
                validation_failures: stats.validation_failures.load(std::sync::atomic::Ordering::Relaxed),
                crc_failures: stats.crc_failures.load(std::sync::atomic::Ordering::Relaxed),
                frame_rate: frames_processed as f32 / elapsed.max(1.0),
            };
            let _ = metrics_tx.send(metrics).await;
            last_signal_report = Instant::now();
        }

        // Check if SDR is still running
        if !sdr.is_running() {
            warn!("SDR capture stopped unexpectedly");
            break;
        }
    }

    // Cleanup
    sdr.stop();
    drop(event_tx);
    drop(metrics_tx);
    let _ = event_handle.await;
    let _ = metrics_handle.await;

    info!("Shutdown complete. Frames processed: {}", frames_processed);
    Ok(())
}
