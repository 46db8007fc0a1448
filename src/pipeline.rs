//! Recording session orchestration.
//!
//! One dedicated thread owns the entire capture path: the blocking chunk
//! read (the single suspension point), decoding, windowing, silence
//! tracking, segment writes, and rotation. The foreground talks to it only
//! through the event channel, the stop and auto-split flags, and the
//! published waveform snapshot. Finalization of a rotated-out segment runs
//! on its own thread, so writing segment N+1 never waits on segment N.

use crate::audio::{
    AmplitudeWindower, CaptureSource, DeviceSource, SampleDecoder, SilenceTracker, WaveformBuffer,
    WaveformFeed,
};
use crate::config::{CaptureConfig, SessionOptions};
use crate::error::PipelineError;
use crate::metadata::MetadataCell;
use crate::segment::{
    finalize, resolve_destination, ClosedSegment, FinalizeOptions, SegmentWriter,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

/// Status updates sent from the capture thread to the foreground.
#[derive(Debug, Clone, Serialize)]
pub enum PipelineEvent {
    SegmentOpened {
        path: PathBuf,
    },
    SegmentClosed {
        segment: ClosedSegment,
        finalizing: bool,
    },
    /// Finalization outcome for one rotated-out segment. Arrives whenever
    /// the fire-and-forget finalizer finishes, independent of the live
    /// session.
    SegmentFinalized {
        path: PathBuf,
        dest: PathBuf,
    },
    FinalizeFailed {
        path: PathBuf,
        error: String,
    },
    /// The session ended on an error; resources are already released.
    RecordingFailed {
        error: String,
    },
    /// Clean stop. The final segment is closed but NOT finalized; callers
    /// that want it trimmed and renamed do so explicitly.
    Stopped {
        segment: ClosedSegment,
    },
}

/// Handle to a running recording session.
///
/// Dropping the handle signals the capture thread to stop and waits for it,
/// so a segment is never left with an unfinalized header.
pub struct CapturePipeline {
    pub events: mpsc::Receiver<PipelineEvent>,
    handle: Option<thread::JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    auto_split: Arc<AtomicBool>,
    waveform: WaveformFeed,
}

impl CapturePipeline {
    /// Open the input device and start recording.
    ///
    /// Device open failures are returned synchronously; anything that fails
    /// later arrives as a [`PipelineEvent::RecordingFailed`].
    pub fn start(
        config: CaptureConfig,
        options: SessionOptions,
        metadata: MetadataCell,
    ) -> Result<Self, PipelineError> {
        let device_config = config.clone();
        Self::start_with(
            // cpal streams are not Send, so the device is opened on the
            // capture thread itself; the handshake below relays the result.
            move || {
                DeviceSource::open(&device_config)
                    .map_err(|err| PipelineError::Device(format!("{err:#}")))
            },
            config,
            options,
            metadata,
        )
    }

    /// Start recording from any chunk source. Tests drive the pipeline with
    /// synthetic sources through this entry point.
    pub fn start_with<S, F>(
        make_source: F,
        config: CaptureConfig,
        options: SessionOptions,
        metadata: MetadataCell,
    ) -> Result<Self, PipelineError>
    where
        S: CaptureSource + 'static,
        F: FnOnce() -> Result<S, PipelineError> + Send + 'static,
    {
        let (events_tx, events_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), PipelineError>>(1);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let auto_split = Arc::new(AtomicBool::new(options.auto_split));
        let waveform = WaveformFeed::new();

        let worker = SessionWorker {
            config,
            options,
            metadata,
            stop_flag: stop_flag.clone(),
            auto_split: auto_split.clone(),
            waveform: waveform.clone(),
            events: events_tx,
        };
        let handle = thread::spawn(move || {
            let source = match make_source() {
                Ok(source) => {
                    let _ = ready_tx.send(Ok(()));
                    source
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };
            worker.run(source);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                events: events_rx,
                handle: Some(handle),
                stop_flag,
                auto_split,
                waveform,
            }),
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(PipelineError::Device(
                    "capture thread exited before startup".to_string(),
                ))
            }
        }
    }

    /// Shared snapshot the display reads; never blocks the capture thread.
    pub fn waveform(&self) -> WaveformFeed {
        self.waveform.clone()
    }

    /// Toggle whether silence-driven split requests are honored.
    pub fn set_auto_split(&self, enabled: bool) {
        self.auto_split.store(enabled, Ordering::Relaxed);
    }

    /// Ask the capture loop to exit after the in-flight chunk.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Clone of the stop flag, for wiring into signal or input handlers.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Wait for the capture thread to finish. Safe to call at any time; the
    /// thread observes the stop flag after the chunk it is processing.
    pub fn join(mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct SessionWorker {
    config: CaptureConfig,
    options: SessionOptions,
    metadata: MetadataCell,
    stop_flag: Arc<AtomicBool>,
    auto_split: Arc<AtomicBool>,
    waveform: WaveformFeed,
    events: mpsc::Sender<PipelineEvent>,
}

impl SessionWorker {
    fn run<S: CaptureSource>(self, source: S) {
        match self.capture_session(source) {
            Ok(segment) => {
                tracing::info!(path = %segment.path.display(), "recording stopped");
                let _ = self.events.send(PipelineEvent::Stopped { segment });
            }
            Err(err) => {
                tracing::error!("recording failed: {err}");
                let _ = self.events.send(PipelineEvent::RecordingFailed {
                    error: err.to_string(),
                });
            }
        }
    }

    fn capture_session<S: CaptureSource>(
        &self,
        mut source: S,
    ) -> Result<ClosedSegment, PipelineError> {
        fs::create_dir_all(&self.options.recordings_dir).map_err(|e| PipelineError::Io {
            path: self.options.recordings_dir.clone(),
            source: e.into(),
        })?;

        let decoder = SampleDecoder::new(self.config.format, self.config.channels);
        let mut windower = AmplitudeWindower::new(
            self.config.format,
            self.config.sample_rate,
            self.options.window_scale,
        );
        let mut tracker = SilenceTracker::new(self.options.silence.clone());
        let mut buffer = WaveformBuffer::new(self.options.waveform_capacity);
        let started = Instant::now();

        let mut writer = SegmentWriter::open(
            self.next_segment_path()?,
            self.config.format,
            self.config.channels,
            self.config.sample_rate,
        )?;
        tracker.begin_segment();
        self.notify_opened(writer.path());

        let window_secs = windower.window_seconds();
        let mut split_pending = false;

        while !self.stop_flag.load(Ordering::Relaxed) {
            // The one suspension point; everything below is synchronous CPU
            // work and file appends.
            let chunk = source
                .read_chunk()
                .map_err(|err| PipelineError::Device(format!("{err:#}")))?;

            let mono = decoder.decode(&chunk)?;
            for amplitude in windower.push(&mono) {
                if tracker.observe(amplitude, window_secs)
                    && self.auto_split.load(Ordering::Relaxed)
                {
                    split_pending = true;
                }
                buffer.push(amplitude);
            }
            self.waveform
                .publish(&buffer, started.elapsed().as_secs_f64());

            // Rotation is decided before the write, so the chunk that
            // requested a split (or would overflow the cap) starts the new
            // segment. The byte cap wins unconditionally.
            if writer.would_overflow(chunk.len()) || split_pending {
                split_pending = false;
                let closed = writer.rotate(self.next_segment_path()?)?;
                tracker.begin_segment();
                self.hand_off(closed);
                self.notify_opened(writer.path());
            }
            writer.write(&chunk)?;
        }

        writer.close()
    }

    /// Timestamped stem like the original recorder; the collision suffix
    /// covers rotations within the same second.
    fn next_segment_path(&self) -> Result<PathBuf, PipelineError> {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
        resolve_destination(&self.options.recordings_dir, &stamp, "wav")
    }

    fn notify_opened(&self, path: &Path) {
        tracing::info!(path = %path.display(), "segment opened");
        let _ = self.events.send(PipelineEvent::SegmentOpened {
            path: path.to_path_buf(),
        });
    }

    /// Report a closed segment and, when auto-rename applies, finalize it on
    /// a fire-and-forget thread with the metadata snapshot taken now.
    fn hand_off(&self, segment: ClosedSegment) {
        let metadata = self.metadata.snapshot();
        let finalizing = self.options.auto_rename && metadata.is_some();
        tracing::info!(
            path = %segment.path.display(),
            bytes = segment.bytes_written,
            finalizing,
            "segment closed"
        );
        let _ = self.events.send(PipelineEvent::SegmentClosed {
            segment: segment.clone(),
            finalizing,
        });

        let Some(metadata) = metadata else { return };
        if !finalizing {
            return;
        }
        let opts = FinalizeOptions {
            songs_dir: self.options.songs_dir.clone(),
            convert_to_flac: self.options.convert_to_flac,
            ffmpeg_cmd: self.options.ffmpeg_cmd.clone(),
            trim_threshold: self.options.trim_threshold,
        };
        let events = self.events.clone();
        thread::spawn(move || {
            let stem = metadata.file_stem();
            match finalize(&segment.path, &stem, &metadata, &opts) {
                Ok(dest) => {
                    tracing::info!(dest = %dest.display(), "segment finalized");
                    let _ = events.send(PipelineEvent::SegmentFinalized {
                        path: segment.path,
                        dest,
                    });
                }
                Err(err) => {
                    tracing::warn!(path = %segment.path.display(), "finalization failed: {err}");
                    let _ = events.send(PipelineEvent::FinalizeFailed {
                        path: segment.path,
                        error: err.to_string(),
                    });
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{SampleFormat, SilenceConfig};
    use crate::metadata::parse_title;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct ScriptedSource {
        chunks: VecDeque<Vec<u8>>,
    }

    impl CaptureSource for ScriptedSource {
        fn read_chunk(&mut self) -> anyhow::Result<Vec<u8>> {
            self.chunks
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("source exhausted"))
        }
    }

    /// Endless silence, paced so a stop request lands within a few chunks.
    struct IdleSource {
        chunk: Vec<u8>,
    }

    impl CaptureSource for IdleSource {
        fn read_chunk(&mut self) -> anyhow::Result<Vec<u8>> {
            thread::sleep(Duration::from_millis(1));
            Ok(self.chunk.clone())
        }
    }

    const CHUNK_FRAMES: usize = 10;

    fn test_config() -> CaptureConfig {
        CaptureConfig {
            device: None,
            format: SampleFormat::Int16,
            channels: 1,
            // 10-sample windows of 10ms each at this rate
            sample_rate: 1_000,
            frame_chunk_size: CHUNK_FRAMES,
        }
    }

    fn test_options(dir: &Path, auto_split: bool) -> SessionOptions {
        SessionOptions {
            auto_split,
            auto_rename: false,
            convert_to_flac: false,
            recordings_dir: dir.join("recordings"),
            songs_dir: dir.join("songs"),
            ffmpeg_cmd: "ffmpeg".to_string(),
            silence: SilenceConfig {
                threshold: 0.01,
                split_secs: 0.02,
                min_record_secs: 0.05,
            },
            waveform_capacity: 100,
            window_scale: 1,
            trim_threshold: crate::segment::DEFAULT_TRIM_THRESHOLD,
        }
    }

    fn loud_chunk() -> Vec<u8> {
        let mut bytes = Vec::with_capacity(CHUNK_FRAMES * 2);
        for i in 0..CHUNK_FRAMES {
            let sample: i16 = if i % 2 == 0 { 8_000 } else { -8_000 };
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    fn silent_chunk() -> Vec<u8> {
        vec![0u8; CHUNK_FRAMES * 2]
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "tracksplit_pipeline_{tag}_{}",
            std::process::id()
        ));
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn drain_events(pipeline: &CapturePipeline) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = pipeline.events.recv_timeout(Duration::from_secs(5)) {
            let done = matches!(
                event,
                PipelineEvent::RecordingFailed { .. } | PipelineEvent::Stopped { .. }
            );
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    #[test]
    fn silence_split_rotates_once() {
        let dir = temp_dir("split");
        let mut chunks: VecDeque<Vec<u8>> = VecDeque::new();
        // 0.1s of sound arms the tracker and passes min_record_secs, then
        // silence accumulates past split_secs on the third silent window.
        for _ in 0..10 {
            chunks.push_back(loud_chunk());
        }
        for _ in 0..5 {
            chunks.push_back(silent_chunk());
        }

        let pipeline = CapturePipeline::start_with(
            move || Ok(ScriptedSource { chunks }),
            test_config(),
            test_options(&dir, true),
            MetadataCell::new(),
        )
        .expect("pipeline starts");

        let events = drain_events(&pipeline);
        pipeline.join();

        let opened = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::SegmentOpened { .. }))
            .count();
        let closed: Vec<&ClosedSegment> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::SegmentClosed { segment, .. } => Some(segment),
                _ => None,
            })
            .collect();
        assert_eq!(opened, 2, "one rotation expected");
        assert_eq!(closed.len(), 1);
        // 10 loud + 2 silent chunks land in the first segment; the chunk
        // whose window crossed the split threshold starts the second.
        assert_eq!(closed[0].bytes_written, 12 * CHUNK_FRAMES as u64 * 2);
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::RecordingFailed { .. })
        ));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn split_requests_ignored_without_auto_split() {
        let dir = temp_dir("nosplit");
        let mut chunks: VecDeque<Vec<u8>> = VecDeque::new();
        for _ in 0..10 {
            chunks.push_back(loud_chunk());
        }
        for _ in 0..10 {
            chunks.push_back(silent_chunk());
        }

        let pipeline = CapturePipeline::start_with(
            move || Ok(ScriptedSource { chunks }),
            test_config(),
            test_options(&dir, false),
            MetadataCell::new(),
        )
        .expect("pipeline starts");

        let events = drain_events(&pipeline);
        pipeline.join();

        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::SegmentClosed { .. })));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn stop_closes_final_segment_without_finalize() {
        let dir = temp_dir("stop");
        let pipeline = CapturePipeline::start_with(
            move || {
                Ok(IdleSource {
                    chunk: silent_chunk(),
                })
            },
            test_config(),
            test_options(&dir, true),
            MetadataCell::new(),
        )
        .expect("pipeline starts");

        thread::sleep(Duration::from_millis(20));
        pipeline.request_stop();
        let events = drain_events(&pipeline);
        pipeline.join();

        let stopped = events.iter().find_map(|e| match e {
            PipelineEvent::Stopped { segment } => Some(segment),
            _ => None,
        });
        let segment = stopped.expect("clean stop reports the closed segment");
        assert!(segment.path.exists());
        assert_eq!(segment.bytes_written % (CHUNK_FRAMES as u64 * 2), 0);
        // stop never hands off to the finalizer
        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::SegmentClosed { .. })));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rotation_hands_off_to_finalizer_with_metadata() {
        let dir = temp_dir("handoff");
        let mut chunks: VecDeque<Vec<u8>> = VecDeque::new();
        for _ in 0..10 {
            chunks.push_back(loud_chunk());
        }
        for _ in 0..5 {
            chunks.push_back(silent_chunk());
        }

        let metadata = MetadataCell::new();
        metadata.store(parse_title("Song - A / B"));
        let mut options = test_options(&dir, true);
        options.auto_rename = true;

        let pipeline = CapturePipeline::start_with(
            move || Ok(ScriptedSource { chunks }),
            test_config(),
            options,
            metadata,
        )
        .expect("pipeline starts");

        let events = drain_events(&pipeline);
        pipeline.join();

        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::SegmentClosed {
                finalizing: true,
                ..
            }
        )));

        // The finalizer runs on its own thread; give it a moment.
        let song = dir.join("songs").join("A,B-Song.wav");
        let mut waited = 0;
        while !song.exists() && waited < 5_000 {
            thread::sleep(Duration::from_millis(10));
            waited += 10;
        }
        assert!(song.exists(), "finalized song file should appear");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn source_failure_reports_recording_failed() {
        let dir = temp_dir("fail");
        let pipeline = CapturePipeline::start_with(
            move || {
                Ok(ScriptedSource {
                    chunks: VecDeque::new(),
                })
            },
            test_config(),
            test_options(&dir, false),
            MetadataCell::new(),
        )
        .expect("pipeline starts");

        let events = drain_events(&pipeline);
        pipeline.join();

        match events.last() {
            Some(PipelineEvent::RecordingFailed { error }) => {
                assert!(error.contains("input device"), "got: {error}");
            }
            other => panic!("expected RecordingFailed, got {other:?}"),
        }

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn start_with_surfaces_open_failure() {
        let dir = temp_dir("openfail");
        let result = CapturePipeline::start_with(
            || {
                Err::<ScriptedSource, _>(PipelineError::Device(
                    "no default input device available".to_string(),
                ))
            },
            test_config(),
            test_options(&dir, false),
            MetadataCell::new(),
        );
        assert!(matches!(result, Err(PipelineError::Device(_))));
        fs::remove_dir_all(&dir).ok();
    }
}
