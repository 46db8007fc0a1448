pub mod audio;
pub mod config;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod segment;
pub mod telemetry;

pub use error::PipelineError;
pub use metadata::{parse_title, MetadataCell, SongMetadata};
pub use pipeline::{CapturePipeline, PipelineEvent};
