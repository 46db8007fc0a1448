//! Segment files: the open WAV writer and post-capture finalization.

mod finalize;
#[cfg(test)]
mod tests;
mod writer;

pub use finalize::{
    finalize, resolve_destination, trim_silence, FinalizeOptions, DEFAULT_TRIM_THRESHOLD,
};
pub use writer::{ClosedSegment, SegmentWriter, SEGMENT_BYTE_CAP};
