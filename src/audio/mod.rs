//! Streaming capture front end: decoding, amplitude windowing, silence
//! tracking, and the device chunk source.
//!
//! Raw device chunks are decoded to mono samples, reduced to fixed
//! non-overlapping windows of ~10ms × scale, and each window's amplitude
//! feeds both the rolling waveform and the silence tracker that drives
//! automatic segment splits.

/// Amplitude slots kept for the rolling waveform display.
pub const WAVEFORM_CAPACITY: usize = 100;

/// Default window scale: windows span 4 × 10ms of audio.
pub const WINDOW_SCALE: u32 = 4;

mod decode;
mod device;
mod silence;
mod window;

pub use decode::{SampleDecoder, SampleFormat};
pub use device::{list_input_devices, CaptureSource, DeviceSource};
pub use silence::{SilenceConfig, SilenceTracker};
pub use window::{AmplitudeWindower, WaveformBuffer, WaveformFeed, WaveformSnapshot};
