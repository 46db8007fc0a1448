//! Raw capture buffer decoding.
//!
//! Device chunks arrive as interleaved little-endian bytes in the session's
//! declared sample format. The decoder reduces each frame to one mono sample
//! (mean across channels) at the format's native scale; normalization to
//! [0,1] happens later, at the windowing stage.

use crate::error::PipelineError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Sample encodings the capture pipeline accepts.
///
/// 24-bit capture is delivered widened to 32-bit-aligned integers (4 bytes
/// per sample, values within the 24-bit range), matching how cpal and most
/// host APIs hand it over.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum SampleFormat {
    Int8,
    Int16,
    Int24,
    Int32,
    Float32,
}

impl SampleFormat {
    /// Bytes occupied by one sample in a capture buffer.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Int8 => 1,
            SampleFormat::Int16 => 2,
            SampleFormat::Int24 | SampleFormat::Int32 | SampleFormat::Float32 => 4,
        }
    }

    /// Bit depth stored in the segment container header.
    pub fn container_bits(self) -> u16 {
        match self {
            SampleFormat::Int8 => 8,
            SampleFormat::Int16 => 16,
            SampleFormat::Int24 => 24,
            SampleFormat::Int32 | SampleFormat::Float32 => 32,
        }
    }

    /// Largest positive sample value; float capture is already in [-1,1].
    pub fn full_scale(self) -> f32 {
        match self {
            SampleFormat::Int8 => i8::MAX as f32,
            SampleFormat::Int16 => i16::MAX as f32,
            SampleFormat::Int24 => 8_388_607.0,
            SampleFormat::Int32 => i32::MAX as f32,
            SampleFormat::Float32 => 1.0,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, SampleFormat::Float32)
    }

    pub fn label(self) -> &'static str {
        match self {
            SampleFormat::Int8 => "int8",
            SampleFormat::Int16 => "int16",
            SampleFormat::Int24 => "int24",
            SampleFormat::Int32 => "int32",
            SampleFormat::Float32 => "float32",
        }
    }

    #[inline]
    fn sample_from_le(self, raw: &[u8]) -> f32 {
        match self {
            SampleFormat::Int8 => raw[0] as i8 as f32,
            SampleFormat::Int16 => i16::from_le_bytes([raw[0], raw[1]]) as f32,
            SampleFormat::Int24 | SampleFormat::Int32 => {
                i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32
            }
            SampleFormat::Float32 => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        }
    }
}

/// Turns raw interleaved capture bytes into mono samples.
#[derive(Debug, Clone)]
pub struct SampleDecoder {
    format: SampleFormat,
    channels: u16,
}

impl SampleDecoder {
    pub fn new(format: SampleFormat, channels: u16) -> Self {
        Self {
            format,
            channels: channels.max(1),
        }
    }

    /// Bytes per interleaved frame (one sample per channel).
    pub fn frame_bytes(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /// Decode a chunk into one mean-of-channels sample per frame.
    ///
    /// The buffer length must be a whole multiple of the frame size;
    /// anything else indicates a decoder/device mismatch and is fatal.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<f32>, PipelineError> {
        let frame_bytes = self.frame_bytes();
        if bytes.len() % frame_bytes != 0 {
            return Err(PipelineError::Format {
                len: bytes.len(),
                frame_bytes,
                format: self.format,
                channels: self.channels,
            });
        }

        let bps = self.format.bytes_per_sample();
        let channels = self.channels as f32;
        let mut mono = Vec::with_capacity(bytes.len() / frame_bytes);
        for frame in bytes.chunks_exact(frame_bytes) {
            let mut acc = 0.0f32;
            for raw in frame.chunks_exact(bps) {
                acc += self.format.sample_from_le(raw);
            }
            mono.push(acc / channels);
        }
        Ok(mono)
    }
}
