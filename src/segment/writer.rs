//! WAV segment ownership and rotation.
//!
//! Exactly one segment is writable at a time; the writer is owned by the
//! capture thread and never shared. Rotation opens the replacement file
//! before finalizing the old one, so a failure to open leaves the current
//! segment intact and writable.

use crate::audio::SampleFormat;
use crate::error::PipelineError;
use hound::{WavSpec, WavWriter};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Hard cap on raw frame bytes per segment file.
pub const SEGMENT_BYTE_CAP: u64 = u32::MAX as u64;

/// A finished output file, ready for finalization hand-off.
#[derive(Debug, Clone, Serialize)]
pub struct ClosedSegment {
    pub path: PathBuf,
    pub format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
    pub bytes_written: u64,
    pub created_at: SystemTime,
}

pub struct SegmentWriter {
    writer: WavWriter<BufWriter<File>>,
    path: PathBuf,
    format: SampleFormat,
    channels: u16,
    sample_rate: u32,
    bytes_written: u64,
    created_at: SystemTime,
}

impl SegmentWriter {
    /// Create a new writable segment file.
    pub fn open(
        path: PathBuf,
        format: SampleFormat,
        channels: u16,
        sample_rate: u32,
    ) -> Result<Self, PipelineError> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: format.container_bits(),
            sample_format: if format.is_float() {
                hound::SampleFormat::Float
            } else {
                hound::SampleFormat::Int
            },
        };
        let writer = WavWriter::create(&path, spec).map_err(|source| PipelineError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            writer,
            path,
            format,
            channels,
            sample_rate,
            bytes_written: 0,
            created_at: SystemTime::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw frame bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// True when accepting `incoming` more bytes would cross the cap.
    /// Checked before every write; the chunk that would overflow starts the
    /// next segment instead.
    pub fn would_overflow(&self, incoming: usize) -> bool {
        self.bytes_written + incoming as u64 > SEGMENT_BYTE_CAP
    }

    /// Append raw interleaved frame bytes to the open segment.
    pub fn write(&mut self, frame_bytes: &[u8]) -> Result<(), PipelineError> {
        let frame = self.format.bytes_per_sample() * self.channels as usize;
        if frame_bytes.len() % frame != 0 {
            return Err(PipelineError::Format {
                len: frame_bytes.len(),
                frame_bytes: frame,
                format: self.format,
                channels: self.channels,
            });
        }

        let io_err = |source: hound::Error, path: &Path| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        };
        let bps = self.format.bytes_per_sample();
        match self.format {
            SampleFormat::Int8 => {
                for raw in frame_bytes.chunks_exact(bps) {
                    self.writer
                        .write_sample(raw[0] as i8)
                        .map_err(|e| io_err(e, &self.path))?;
                }
            }
            SampleFormat::Int16 => {
                for raw in frame_bytes.chunks_exact(bps) {
                    self.writer
                        .write_sample(i16::from_le_bytes([raw[0], raw[1]]))
                        .map_err(|e| io_err(e, &self.path))?;
                }
            }
            SampleFormat::Int24 | SampleFormat::Int32 => {
                for raw in frame_bytes.chunks_exact(bps) {
                    self.writer
                        .write_sample(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
                        .map_err(|e| io_err(e, &self.path))?;
                }
            }
            SampleFormat::Float32 => {
                for raw in frame_bytes.chunks_exact(bps) {
                    self.writer
                        .write_sample(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
                        .map_err(|e| io_err(e, &self.path))?;
                }
            }
        }
        self.bytes_written += frame_bytes.len() as u64;
        Ok(())
    }

    /// Close the current file and continue writing into `new_path`.
    ///
    /// Returns the closed segment for finalization hand-off. No frame is
    /// lost or attributed to the wrong file: the caller writes the pending
    /// chunk only after rotation returns.
    pub fn rotate(&mut self, new_path: PathBuf) -> Result<ClosedSegment, PipelineError> {
        let next = Self::open(new_path, self.format, self.channels, self.sample_rate)?;
        let previous = std::mem::replace(self, next);
        previous.close()
    }

    /// Finalize the container header and release the file handle.
    pub fn close(self) -> Result<ClosedSegment, PipelineError> {
        let closed = ClosedSegment {
            path: self.path.clone(),
            format: self.format,
            channels: self.channels,
            sample_rate: self.sample_rate,
            bytes_written: self.bytes_written,
            created_at: self.created_at,
        };
        self.writer.finalize().map_err(|source| PipelineError::Io {
            path: closed.path.clone(),
            source,
        })?;
        Ok(closed)
    }

    #[cfg(test)]
    pub(crate) fn set_bytes_written_for_tests(&mut self, bytes: u64) {
        self.bytes_written = bytes;
    }
}
