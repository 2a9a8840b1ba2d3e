// THEORY:
// The engine never acquires pixels itself. A `FrameSource` is the seam where a
// camera, a decoder, or a directory of stills plugs in. Acquisition may be slow
// or blocking, so the trait is async (boxed futures keep it object safe and let
// the pipeline hold a `Box<dyn FrameSource>`).
//
// Contract:
// - `open` is called once per start. An error here is a fatal acquisition
//   failure; the pipeline does not retry.
// - `dimensions` may report the native capture size once opened. The pipeline
//   re-derives its diff grid from it.
// - `next_frame` yields `Ok(None)` when the stream has ended cleanly and `Err`
//   on failure. Frames may be at capture or diff resolution.

use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::core_modules::utils::image_helper::image_helper;
use crate::error::{MotionError, Result};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait FrameSource: Send {
    fn open(&mut self) -> BoxFuture<'_, Result<()>>;

    fn dimensions(&self) -> Option<(u32, u32)> {
        None
    }

    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<PixelBuffer>>>;
}

/// Serves frames from memory, in order. Useful for replays and tests.
pub struct MemoryFrameSource {
    frames: Vec<PixelBuffer>,
    cursor: usize,
    looping: bool,
    open_error: Option<String>,
    dimensions: Option<(u32, u32)>,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<PixelBuffer>) -> Self {
        Self {
            frames,
            cursor: 0,
            looping: false,
            open_error: None,
            dimensions: None,
        }
    }

    /// Restart from the first frame instead of ending the stream.
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// Make `open` fail with `message`, as a device that cannot be acquired.
    pub fn failing_open(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    pub fn reporting_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }
}

impl FrameSource for MemoryFrameSource {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if let Some(message) = &self.open_error {
                return Err(MotionError::Acquisition(message.clone()));
            }
            self.cursor = 0;
            Ok(())
        })
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<PixelBuffer>>> {
        Box::pin(async move {
            if self.cursor >= self.frames.len() {
                if !self.looping || self.frames.is_empty() {
                    return Ok(None);
                }
                self.cursor = 0;
            }
            let frame = self.frames[self.cursor].clone();
            self.cursor += 1;
            Ok(Some(frame))
        })
    }
}

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// Replays the image files of a directory in file-name order.
pub struct DirectoryFrameSource {
    directory: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    dimensions: Option<(u32, u32)>,
}

impl DirectoryFrameSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            files: Vec::new(),
            cursor: 0,
            dimensions: None,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn list_frames(directory: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            let is_frame = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if path.is_file() && is_frame {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl FrameSource for DirectoryFrameSource {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let directory = self.directory.clone();
            let listed = tokio::task::spawn_blocking(move || {
                let files = Self::list_frames(&directory)?;
                let first = files.first().ok_or_else(|| {
                    MotionError::Acquisition(format!("no frames in {}", directory.display()))
                })?;
                let dimensions = image::image_dimensions(first)?;
                Ok::<_, MotionError>((files, dimensions))
            })
            .await
            .map_err(|e| MotionError::Acquisition(e.to_string()))?;

            let (files, dimensions) =
                listed.map_err(|e| MotionError::Acquisition(e.to_string()))?;
            debug!(
                directory = %self.directory.display(),
                frames = files.len(),
                "opened frame directory"
            );
            self.files = files;
            self.dimensions = Some(dimensions);
            self.cursor = 0;
            Ok(())
        })
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<PixelBuffer>>> {
        Box::pin(async move {
            let Some(path) = self.files.get(self.cursor).cloned() else {
                return Ok(None);
            };
            self.cursor += 1;
            let frame = tokio::task::spawn_blocking(move || image_helper::load(&path))
                .await
                .map_err(|e| MotionError::Acquisition(e.to_string()))??;
            Ok(Some(frame))
        })
    }
}
