// THEORY:
// A `MotionBox` is the tightest axis-aligned rectangle, in diff-space, around
// every pixel that crossed the pixel threshold during one diff pass. It is
// born as a 1x1 box on the first qualifying pixel and only ever grows, so
// `min <= max` holds on both axes for its whole life.
//
// Coordinates are inclusive, origin top-left, x to the right, y downward.

/// Inclusive bounding rectangle in diff-space coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionBox {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl MotionBox {
    /// A single-pixel box at `(x, y)`.
    pub fn at(x: u32, y: u32) -> Self {
        Self {
            x_min: x,
            x_max: x,
            y_min: y,
            y_max: y,
        }
    }

    /// Grows `current` to include `(x, y)`, creating it on first use.
    pub fn include(current: Option<MotionBox>, x: u32, y: u32) -> MotionBox {
        match current {
            Some(mut motion_box) => {
                motion_box.expand(x, y);
                motion_box
            }
            None => Self::at(x, y),
        }
    }

    pub fn expand(&mut self, x: u32, y: u32) {
        self.x_min = self.x_min.min(x);
        self.x_max = self.x_max.max(x);
        self.y_min = self.y_min.min(y);
        self.y_max = self.y_max.max(y);
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y)
    }

    /// Width in pixels, counting both edges.
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    /// Maps the box onto capture resolution. Each diff-space pixel covers a
    /// `scale` x `scale` block, so the far edges land on the last pixel of
    /// their block. Edges saturate at `u32::MAX`.
    pub fn to_capture_space(&self, scale: u32) -> MotionBox {
        let far_edge = |max: u32| max.saturating_add(1).saturating_mul(scale).saturating_sub(1);
        MotionBox {
            x_min: self.x_min.saturating_mul(scale),
            x_max: far_edge(self.x_max),
            y_min: self.y_min.saturating_mul(scale),
            y_max: far_edge(self.y_max),
        }
    }

    /// Flips the box horizontally within a grid `width` pixels wide, for
    /// displays that render the feed mirrored. `None` if the box does not fit
    /// inside the grid.
    pub fn mirrored(&self, width: u32) -> Option<MotionBox> {
        let last = width.checked_sub(1)?;
        Some(MotionBox {
            x_min: last.checked_sub(self.x_max)?,
            x_max: last - self.x_min,
            y_min: self.y_min,
            y_max: self.y_max,
        })
    }
}
