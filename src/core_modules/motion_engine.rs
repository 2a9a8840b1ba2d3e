// THEORY:
// The `MotionEngine` is the only stateful analyzer in the crate. It remembers
// exactly one thing between calls: the previous frame at diff resolution.
// Every call compares the new frame against it in a single pass and then
// replaces it.
//
// Key architectural principles:
// 1.  **Baseline first**: right after construction, `configure` or `reset` there
//     is nothing to compare against. The first frame is absorbed as a
//     baseline and `process_frame` yields `None`. Only later frames are scored.
// 2.  **One pass, three outputs**: the same loop writes the green-channel
//     visualization, counts qualifying pixels, and (when enabled) grows the
//     motion box and fills the pixel mask. Coordinates come from the flat pixel
//     index: `x = i % diff_width`, `y = i / diff_width`.
// 3.  **Two thresholds, two operators**: `has_motion` is `score >= score_threshold`
//     but the box is attached only when `score > score_threshold`. Consumers
//     rely on the box being absent exactly at the threshold, so the asymmetry
//     stays.
// 4.  **Atomic calls**: a frame of the wrong size is rejected before anything is
//     touched. The retained frame is only replaced after a full pass.

use crate::config::{MotionConfig, MotionOptions, validate_pixel_diff_threshold};
use crate::core_modules::motion_box::MotionBox;
use crate::core_modules::motion_pixels::MotionPixelMask;
use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::error::{MotionError, Result};
use tracing::{debug, trace};

const MAX_INTENSITY: u32 = 255;

/// Whether the engine holds a frame to diff against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    NotReady,
    Ready,
}

/// The outcome of diffing one frame against its predecessor.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult {
    /// Number of pixels whose weighted difference met the pixel threshold.
    pub score: u32,
    /// `score >= score_threshold`.
    pub has_motion: bool,
    /// Present only if boxes are enabled and `score > score_threshold`.
    pub motion_box: Option<MotionBox>,
    /// Present whenever pixel masks are enabled, even if empty.
    pub motion_pixels: Option<MotionPixelMask>,
    /// Green-intensity rendering of the difference, at diff resolution.
    pub diff_image: PixelBuffer,
}

impl DiffResult {
    pub fn check_motion_pixel(&self, x: u32, y: u32) -> bool {
        self.motion_pixels
            .as_ref()
            .is_some_and(|mask| mask.is_changed(x, y))
    }
}

pub struct MotionEngine {
    config: MotionConfig,
    previous: Option<PixelBuffer>,
}

impl MotionEngine {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            previous: None,
        }
    }

    /// Builds an engine straight from caller options.
    pub fn with_options(options: Option<&MotionOptions>) -> Result<Self> {
        Ok(Self::new(MotionConfig::from_options(options)?))
    }

    /// Replaces the configuration and drops the baseline. On error the engine
    /// is left exactly as it was.
    pub fn configure(&mut self, options: Option<&MotionOptions>) -> Result<()> {
        let config = MotionConfig::from_options(options)?;
        self.apply_config(config);
        Ok(())
    }

    pub(crate) fn apply_config(&mut self, config: MotionConfig) {
        self.config = config;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn state(&self) -> EngineState {
        match self.previous {
            Some(_) => EngineState::Ready,
            None => EngineState::NotReady,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn pixel_diff_threshold(&self) -> u32 {
        self.config.pixel_diff_threshold
    }

    pub fn set_pixel_diff_threshold(&mut self, threshold: u32) -> Result<()> {
        validate_pixel_diff_threshold(threshold)?;
        self.config.pixel_diff_threshold = threshold;
        Ok(())
    }

    pub fn score_threshold(&self) -> u32 {
        self.config.score_threshold
    }

    pub fn set_score_threshold(&mut self, threshold: u32) {
        self.config.score_threshold = threshold;
    }

    /// Scores `frame` against the retained frame, then retains `frame`.
    ///
    /// Returns `Ok(None)` while establishing the baseline. The frame must be at
    /// the configured diff resolution.
    pub fn process_frame(&mut self, frame: PixelBuffer) -> Result<Option<DiffResult>> {
        let (width, height) = (self.config.diff_width, self.config.diff_height);
        if !frame.has_dimensions(width, height) {
            return Err(MotionError::DimensionMismatch {
                expected_width: width,
                expected_height: height,
                actual_width: frame.width(),
                actual_height: frame.height(),
                actual_len: frame.as_bytes().len(),
            });
        }

        let result = match &self.previous {
            Some(previous) => Some(self.diff(previous, &frame)),
            None => {
                trace!(width, height, "absorbed baseline frame");
                None
            }
        };

        self.previous = Some(frame);
        Ok(result)
    }

    fn diff(&self, previous: &PixelBuffer, current: &PixelBuffer) -> DiffResult {
        let config = &self.config;
        let threshold_tenths = config.pixel_diff_threshold * 10;

        let mut diff_image = Vec::with_capacity(current.as_bytes().len());
        let mut score = 0u32;
        let mut motion_box: Option<MotionBox> = None;
        let mut motion_pixels = config.include_motion_pixels.then(MotionPixelMask::new);

        let pairs = current
            .as_bytes()
            .chunks_exact(CHANNELS)
            .zip(previous.as_bytes().chunks_exact(CHANNELS));

        for (index, (now, before)) in pairs.enumerate() {
            let difference = Pixel::from(now).difference(&Pixel::from(before));
            let weighted = difference.weighted_tenths();

            let normalized = ((weighted * MAX_INTENSITY + threshold_tenths / 2)
                / threshold_tenths)
                .min(MAX_INTENSITY) as u8;
            diff_image.extend_from_slice(&[0, normalized, 0, difference.alpha]);

            if weighted >= threshold_tenths {
                score += 1;
                let x = index as u32 % config.diff_width;
                let y = index as u32 / config.diff_width;

                if config.include_motion_box {
                    motion_box = Some(MotionBox::include(motion_box, x, y));
                }
                if let Some(mask) = motion_pixels.as_mut() {
                    mask.mark(x, y);
                }
            }
        }

        let has_motion = score >= config.score_threshold;
        let motion_box = motion_box.filter(|_| score > config.score_threshold);

        debug!(
            score,
            has_motion,
            boxed = motion_box.is_some(),
            "scored frame"
        );

        DiffResult {
            score,
            has_motion,
            motion_box,
            motion_pixels,
            diff_image: PixelBuffer::from_sized(current.width(), current.height(), diff_image),
        }
    }
}
