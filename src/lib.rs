// THEORY:
// This file is the main entry point for the `motion_vision` library crate.
// The public surface is deliberately small: `MotionEngine` for callers that
// feed frames themselves, and `MotionPipeline` for callers that want the
// periodic capture lifecycle run for them. Both speak `PixelBuffer` in and
// `DiffResult` out; everything under `core_modules` is the machinery behind
// them.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod frame_source;
pub mod pipeline;

pub use config::{MotionConfig, MotionOptions, Sensitivity, Settings};
pub use core_modules::motion_box::MotionBox;
pub use core_modules::motion_engine::{DiffResult, EngineState, MotionEngine};
pub use core_modules::motion_pixels::MotionPixelMask;
pub use core_modules::pixel::pixel::Pixel;
pub use core_modules::pixel_buffer::PixelBuffer;
pub use error::{MotionError, Result};
pub use frame_source::{DirectoryFrameSource, FrameSource, MemoryFrameSource};
pub use pipeline::{CaptureEvent, MotionEvent, MotionPipeline, PipelineState};
