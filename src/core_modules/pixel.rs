// THEORY:
// `Pixel` is the smallest unit the engine reasons about: a "dumb" RGBA sample
// that knows two things about itself relative to another sample.
//
// 1.  **Difference**: the per-channel absolute difference against another
//     pixel. This mirrors "difference" compositing, so the diff of two frames
//     is itself a pixel-shaped value.
// 2.  **Weighted magnitude**: a cheap luminance estimate of a difference pixel,
//     weighting red 0.3, green 0.6 and blue 0.1. The weights are applied in
//     integer tenths so that threshold comparisons are exact.
//
// Anything that needs more than two pixels (coordinates, boxes, scores) lives
// in `motion_engine`.

pub mod pixel {
    pub type Channel = u8;
    /// Luminance-weighted magnitude, in tenths of a channel unit (0..=2550).
    pub type WeightedTenths = u32;

    pub const CHANNELS: usize = 4;

    const RED_WEIGHT: u32 = 3;
    const GREEN_WEIGHT: u32 = 6;
    const BLUE_WEIGHT: u32 = 1;

    /// A single RGBA sample.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        pub red: Channel,
        pub green: Channel,
        pub blue: Channel,
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Self {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// Per-channel absolute difference. Alpha is taken from `self`.
        #[inline]
        pub fn difference(&self, other: &Pixel) -> Pixel {
            Pixel {
                red: self.red.abs_diff(other.red),
                green: self.green.abs_diff(other.green),
                blue: self.blue.abs_diff(other.blue),
                alpha: self.alpha,
            }
        }

        /// `10 * (0.3 R + 0.6 G + 0.1 B)`, exact.
        #[inline]
        pub fn weighted_tenths(&self) -> WeightedTenths {
            RED_WEIGHT * self.red as u32
                + GREEN_WEIGHT * self.green as u32
                + BLUE_WEIGHT * self.blue as u32
        }

        /// `0.3 R + 0.6 G + 0.1 B` as a float, for reporting.
        pub fn weighted_luminance(&self) -> f64 {
            self.weighted_tenths() as f64 / 10.0
        }
    }

    impl From<&[u8]> for Pixel {
        fn from(bytes: &[u8]) -> Self {
            Pixel {
                red: bytes[0],
                green: bytes[1],
                blue: bytes[2],
                alpha: bytes[3],
            }
        }
    }
}
