//! Command-line parsing, the optional YAML overlay, and validation helpers.

mod defaults;
mod validation;

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::{SampleFormat, SilenceConfig, WAVEFORM_CAPACITY, WINDOW_SCALE};
use crate::segment::DEFAULT_TRIM_THRESHOLD;
pub use defaults::{
    DEFAULT_CHANNELS, DEFAULT_CHUNK_FRAMES, DEFAULT_MIN_RECORD_SECS, DEFAULT_RECORDINGS_DIR,
    DEFAULT_SAMPLE_RATE, DEFAULT_SILENCE_SPLIT_SECS, DEFAULT_SILENCE_THRESHOLD, DEFAULT_SONGS_DIR,
};

/// CLI options for the recorder. Validated values feed the capture pipeline
/// and the finalizer unchanged.
#[derive(Debug, Parser, Clone)]
#[command(about = "Live stream recorder that splits songs on silence", author, version)]
pub struct AppConfig {
    /// Preferred audio input device name (default device when omitted)
    #[arg(long = "input-device")]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Capture sample format
    #[arg(long = "sample-format", value_enum, default_value_t = SampleFormat::Int16)]
    pub sample_format: SampleFormat,

    /// Input channel count
    #[arg(long, default_value_t = DEFAULT_CHANNELS)]
    pub channels: u16,

    /// Sample rate (Hz)
    #[arg(long = "sample-rate", default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Frames per device read
    #[arg(long = "chunk-frames", default_value_t = DEFAULT_CHUNK_FRAMES)]
    pub chunk_frames: usize,

    /// Start a new file after sustained silence
    #[arg(long = "auto-split", default_value_t = false)]
    pub auto_split: bool,

    /// Finalize rotated-out segments using the current song metadata
    #[arg(long = "auto-rename", default_value_t = false)]
    pub auto_rename: bool,

    /// Transcode finalized segments to FLAC
    #[arg(long = "convert-flac", default_value_t = false)]
    pub convert_flac: bool,

    /// FFmpeg binary location
    #[arg(long = "ffmpeg-cmd", default_value = "ffmpeg")]
    pub ffmpeg_cmd: String,

    /// Amplitude below this counts as silence (normalized [0,1] scale)
    #[arg(long = "silence-threshold", default_value_t = DEFAULT_SILENCE_THRESHOLD)]
    pub silence_threshold: f32,

    /// Sustained silence required before a split (seconds)
    #[arg(long = "silence-split-secs", default_value_t = DEFAULT_SILENCE_SPLIT_SECS)]
    pub silence_split_secs: f64,

    /// Minimum recording time before a split may fire (seconds)
    #[arg(long = "min-record-secs", default_value_t = DEFAULT_MIN_RECORD_SECS)]
    pub min_record_secs: f64,

    /// Amplitude window scale (multiples of 10ms of audio)
    #[arg(long = "window-scale", default_value_t = WINDOW_SCALE)]
    pub window_scale: u32,

    /// Directory for in-progress recordings
    #[arg(long = "recordings-dir", default_value = DEFAULT_RECORDINGS_DIR)]
    pub recordings_dir: PathBuf,

    /// Directory for finalized songs
    #[arg(long = "songs-dir", default_value = DEFAULT_SONGS_DIR)]
    pub songs_dir: PathBuf,

    /// Stop after this many seconds (0 = record until Enter is pressed)
    #[arg(long = "record-secs", default_value_t = 0)]
    pub record_secs: u64,

    /// Now-playing title ("Song - Artist A / Artist B") used for naming;
    /// stands in for the external window-title watcher
    #[arg(long = "song-title")]
    pub song_title: Option<String>,

    /// Emit status events as JSON lines instead of plain text
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long = "logs", env = "TRACKSPLIT_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Optional YAML file whose values override the flags above
    #[arg(long = "config")]
    pub config_file: Option<PathBuf>,
}

impl AppConfig {
    /// Immutable per-session capture parameters.
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            device: self.input_device.clone(),
            format: self.sample_format,
            channels: self.channels,
            sample_rate: self.sample_rate,
            frame_chunk_size: self.chunk_frames,
        }
    }

    /// Session behavior knobs consumed by the pipeline and finalizer.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            auto_split: self.auto_split,
            auto_rename: self.auto_rename,
            convert_to_flac: self.convert_flac,
            recordings_dir: self.recordings_dir.clone(),
            songs_dir: self.songs_dir.clone(),
            ffmpeg_cmd: self.ffmpeg_cmd.clone(),
            silence: SilenceConfig {
                threshold: self.silence_threshold,
                split_secs: self.silence_split_secs,
                min_record_secs: self.min_record_secs,
            },
            waveform_capacity: WAVEFORM_CAPACITY,
            window_scale: self.window_scale,
            trim_threshold: DEFAULT_TRIM_THRESHOLD,
        }
    }
}

/// What the input device is opened with. Immutable for the lifetime of one
/// recording session; changing any field means stop and start again.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub device: Option<String>,
    pub format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
    pub frame_chunk_size: usize,
}

/// Session behavior derived from the config surface.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub auto_split: bool,
    pub auto_rename: bool,
    pub convert_to_flac: bool,
    pub recordings_dir: PathBuf,
    pub songs_dir: PathBuf,
    pub ffmpeg_cmd: String,
    pub silence: SilenceConfig,
    pub waveform_capacity: usize,
    pub window_scale: u32,
    pub trim_threshold: f32,
}

/// Optional YAML overlay. Present fields override the corresponding flags.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileOverrides {
    pub input_device: Option<String>,
    pub sample_format: Option<SampleFormat>,
    pub channels: Option<u16>,
    pub sample_rate: Option<u32>,
    pub chunk_frames: Option<usize>,
    pub auto_split: Option<bool>,
    pub auto_rename: Option<bool>,
    pub convert_flac: Option<bool>,
    pub ffmpeg_cmd: Option<String>,
    pub silence_threshold: Option<f32>,
    pub silence_split_secs: Option<f64>,
    pub min_record_secs: Option<f64>,
    pub window_scale: Option<u32>,
    pub recordings_dir: Option<PathBuf>,
    pub songs_dir: Option<PathBuf>,
}
