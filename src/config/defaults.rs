//! Default values and validation bounds for the recording session.

pub const DEFAULT_CHANNELS: u16 = 2;
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_CHUNK_FRAMES: usize = 7_168;
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.01;
pub const DEFAULT_SILENCE_SPLIT_SECS: f64 = 0.5;
pub const DEFAULT_MIN_RECORD_SECS: f64 = 10.0;
pub const DEFAULT_RECORDINGS_DIR: &str = "recordings";
pub const DEFAULT_SONGS_DIR: &str = "songs";

pub const MIN_CHANNELS: u16 = 1;
pub const MAX_CHANNELS: u16 = 8;
pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;
pub const MIN_CHUNK_FRAMES: usize = 64;
pub const MAX_CHUNK_FRAMES: usize = 65_536;
pub const MAX_WINDOW_SCALE: u32 = 100;
