// THEORY:
// The pixel mask answers "did this diff-space pixel change?" for one diff pass.
// Motion is usually sparse, so only the changed coordinates are stored rather
// than a full grid of flags. It is filled by the engine only when
// `include_motion_pixels` is set.

use std::collections::HashSet;

/// Sparse set of diff-space coordinates whose difference crossed the pixel
/// threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MotionPixelMask {
    changed: HashSet<(u32, u32)>,
}

impl MotionPixelMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, x: u32, y: u32) {
        self.changed.insert((x, y));
    }

    pub fn is_changed(&self, x: u32, y: u32) -> bool {
        self.changed.contains(&(x, y))
    }

    pub fn len(&self) -> usize {
        self.changed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.changed.iter().copied()
    }
}
