//! Error taxonomy for the capture and finalization pipeline.
//!
//! Device, format, and segment I/O failures are fatal to the recording
//! session; transcode and naming failures stay scoped to the one segment
//! being finalized.

use crate::audio::SampleFormat;
use std::path::PathBuf;
use thiserror::Error;

/// Bounded search depth for `(n)`-suffixed destination names.
pub const MAX_NAME_ATTEMPTS: u32 = 10_000;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input device could not be opened or read.
    #[error("input device: {0}")]
    Device(String),

    /// A raw capture buffer did not align with the declared sample layout.
    #[error(
        "misaligned capture buffer: {len} bytes is not a multiple of the \
         {frame_bytes}-byte frame ({format:?}, {channels} channels)"
    )]
    Format {
        len: usize,
        frame_bytes: usize,
        format: SampleFormat,
        channels: u16,
    },

    /// Segment file could not be created, written, or finalized.
    #[error("segment file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// The external encoder failed for one segment.
    #[error("transcode of {} failed: {reason}", path.display())]
    Transcode { path: PathBuf, reason: String },

    /// No free destination name within the search bound.
    #[error("no free destination name for '{stem}' after {attempts} attempts")]
    CollisionExhausted { stem: String, attempts: u32 },
}
