// THEORY:
// Every failure the engine or its orchestrator can surface is one variant of
// `MotionError`. Nothing is retried internally; the variant tells the caller
// which recovery policy applies.
//
// - `Configuration`: bad or missing options. Nothing was applied.
// - `DimensionMismatch`: a buffer disagrees with the size it was declared or
//   configured for. The engine's retained frame is untouched, so the caller
//   can retry with a corrected buffer.
// - `Acquisition`: the frame source failed. Always fatal for the session.
// - `Lifecycle`: the pipeline was driven out of order (start while streaming)
//   or its capture task died.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MotionError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error(
        "frame is {actual_width}x{actual_height} ({actual_len} bytes), expected {expected_width}x{expected_height}"
    )]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
        actual_len: usize,
    },

    #[error("frame acquisition failed: {0}")]
    Acquisition(String),

    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, MotionError>;
