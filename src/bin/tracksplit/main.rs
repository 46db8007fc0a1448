//! Headless recording session driver.
//!
//! Opens the configured input device, records until the requested duration
//! elapses (or Enter is pressed), and prints segment lifecycle events as
//! they happen — as plain text with a simple level meter, or as JSON lines
//! for an external UI.

use anyhow::{bail, Result};
use std::io::{self, BufRead, Write};
use std::sync::atomic::Ordering;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::{Duration, Instant};
use tracksplit::audio::{list_input_devices, WaveformSnapshot};
use tracksplit::config::AppConfig;
use tracksplit::metadata::{parse_title, MetadataCell};
use tracksplit::pipeline::{CapturePipeline, PipelineEvent};
use tracksplit::telemetry;

const EVENT_POLL: Duration = Duration::from_millis(200);
const METER_SLOTS: usize = 30;

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    telemetry::init_tracing(&config);

    if config.list_input_devices {
        for name in list_input_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    let metadata = MetadataCell::new();
    if let Some(title) = &config.song_title {
        metadata.store(parse_title(title));
    }

    let pipeline = CapturePipeline::start(
        config.capture_config(),
        config.session_options(),
        metadata,
    )?;

    if !config.json {
        if config.record_secs > 0 {
            println!("recording for {}s...", config.record_secs);
        } else {
            println!("recording... press Enter to stop");
        }
    }

    // Enter on stdin doubles as the stop button when no duration is set.
    if config.record_secs == 0 {
        let stop_flag = pipeline.stop_flag();
        thread::spawn(move || {
            let mut line = String::new();
            let _ = io::stdin().lock().read_line(&mut line);
            stop_flag.store(true, Ordering::Relaxed);
        });
    }

    let waveform = pipeline.waveform();
    let deadline = (config.record_secs > 0)
        .then(|| Instant::now() + Duration::from_secs(config.record_secs));
    let mut failure = None;

    loop {
        match pipeline.events.recv_timeout(EVENT_POLL) {
            Ok(event) => {
                print_event(&event, config.json);
                match event {
                    PipelineEvent::RecordingFailed { error } => {
                        failure = Some(error);
                        break;
                    }
                    PipelineEvent::Stopped { .. } => break,
                    _ => {}
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if !config.json {
            render_meter(&waveform.snapshot());
        }
        if deadline.is_some_and(|at| Instant::now() >= at) {
            pipeline.request_stop();
        }
    }
    pipeline.join();

    if let Some(error) = failure {
        bail!("recording failed: {error}");
    }
    Ok(())
}

fn print_event(event: &PipelineEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }
    match event {
        PipelineEvent::SegmentOpened { path } => {
            println!("\rsegment opened: {}", path.display());
        }
        PipelineEvent::SegmentClosed { segment, finalizing } => {
            println!(
                "\rsegment closed: {} ({} bytes{})",
                segment.path.display(),
                segment.bytes_written,
                if *finalizing { ", finalizing" } else { "" }
            );
        }
        PipelineEvent::SegmentFinalized { path, dest } => {
            println!("\rfinalized: {} -> {}", path.display(), dest.display());
        }
        PipelineEvent::FinalizeFailed { path, error } => {
            eprintln!("\rfinalize failed for {}: {error}", path.display());
        }
        PipelineEvent::RecordingFailed { error } => {
            eprintln!("\rrecording failed: {error}");
        }
        PipelineEvent::Stopped { segment } => {
            println!("\rstopped; last segment: {}", segment.path.display());
        }
    }
}

/// One-line level meter driven by the published waveform snapshot.
fn render_meter(snapshot: &WaveformSnapshot) {
    let level = snapshot.amplitudes.last().copied().unwrap_or(0.0);
    let filled = ((level * METER_SLOTS as f32).round() as usize).min(METER_SLOTS);
    print!(
        "\r[{}{}] {}",
        "#".repeat(filled),
        " ".repeat(METER_SLOTS - filled),
        format_elapsed(snapshot.elapsed_secs)
    );
    let _ = io::stdout().flush();
}

fn format_elapsed(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3_600,
        (total % 3_600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::format_elapsed;

    #[test]
    fn elapsed_formats_as_hms() {
        assert_eq!(format_elapsed(0.0), "00:00:00");
        assert_eq!(format_elapsed(61.9), "00:01:01");
        assert_eq!(format_elapsed(3_661.0), "01:01:01");
        assert_eq!(format_elapsed(-5.0), "00:00:00");
    }
}
