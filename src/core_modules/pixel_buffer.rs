// THEORY:
// `PixelBuffer` is the unit of exchange between a frame source, the engine and
// whatever renders the results. It owns a flat RGBA byte vector plus its
// dimensions, and refuses to exist if the two disagree
// (`len == width * height * 4`). Every other module can therefore index it
// without bounds anxiety.
//
// Downscaling lives here as well: the engine only ever scores buffers at
// diff resolution, and capture-resolution frames are reduced with a bilinear
// filter before they reach it.

use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use crate::error::{MotionError, Result};
use image::{ImageBuffer, Rgba, RgbaImage, imageops::FilterType};

/// Owned RGBA raster data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw RGBA bytes, checking the length against the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if data.len() != Self::byte_len(width, height) {
            return Err(MotionError::DimensionMismatch {
                expected_width: width,
                expected_height: height,
                actual_width: width,
                actual_height: height,
                actual_len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Wraps bytes the caller has already laid out as `width * height` RGBA
    /// pixels.
    pub(crate) fn from_sized(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), Self::byte_len(width, height));
        Self {
            width,
            height,
            data,
        }
    }

    /// A buffer of transparent black pixels.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; Self::byte_len(width, height)],
        }
    }

    /// A buffer where every pixel is `pixel`.
    pub fn filled(width: u32, height: u32, pixel: Pixel) -> Self {
        let mut buffer = Self::blank(width, height);
        for chunk in buffer.data.chunks_exact_mut(CHANNELS) {
            chunk.copy_from_slice(&[pixel.red, pixel.green, pixel.blue, pixel.alpha]);
        }
        buffer
    }

    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * CHANNELS
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len() / CHANNELS
    }

    pub fn has_dimensions(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.data.chunks_exact(CHANNELS).map(Pixel::from)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Pixel> {
        let start = self.offset(x, y)?;
        Some(Pixel::from(&self.data[start..start + CHANNELS]))
    }

    /// Overwrites the pixel at `(x, y)`. Returns `false` if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Pixel) -> bool {
        match self.offset(x, y) {
            Some(start) => {
                self.data[start..start + CHANNELS]
                    .copy_from_slice(&[pixel.red, pixel.green, pixel.blue, pixel.alpha]);
                true
            }
            None => false,
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * CHANNELS)
    }

    /// Resamples to `width` x `height`. Returns a plain copy when the size
    /// already matches.
    pub fn downscale(&self, width: u32, height: u32) -> Result<PixelBuffer> {
        if self.has_dimensions(width, height) {
            return Ok(self.clone());
        }
        if width == 0 || height == 0 {
            return Err(MotionError::Configuration(format!(
                "cannot resample to an empty {width}x{height} grid"
            )));
        }
        let view: ImageBuffer<Rgba<u8>, &[u8]> =
            ImageBuffer::from_raw(self.width, self.height, self.data.as_slice()).ok_or(
                MotionError::DimensionMismatch {
                    expected_width: self.width,
                    expected_height: self.height,
                    actual_width: self.width,
                    actual_height: self.height,
                    actual_len: self.data.len(),
                },
            )?;
        let resized = image::imageops::resize(&view, width, height, FilterType::Triangle);
        Ok(PixelBuffer::from(resized))
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        // Length is guaranteed by construction.
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_data_of_the_wrong_length() {
        let err = PixelBuffer::new(4, 3, vec![0u8; 47]).unwrap_err();
        assert!(matches!(
            err,
            MotionError::DimensionMismatch { actual_len: 47, .. }
        ));
        assert!(PixelBuffer::new(4, 3, vec![0u8; 48]).is_ok());
    }

    #[test]
    fn pixel_addressing_is_row_major() {
        let mut buffer = PixelBuffer::blank(4, 3);
        assert!(buffer.set_pixel(2, 1, Pixel::new(9, 8, 7, 6)));
        assert!(!buffer.set_pixel(4, 0, Pixel::default()));

        // (y * width + x) * 4 = (1 * 4 + 2) * 4
        assert_eq!(&buffer.as_bytes()[24..28], &[9, 8, 7, 6]);
        assert_eq!(buffer.pixel(2, 1), Some(Pixel::new(9, 8, 7, 6)));
        assert_eq!(buffer.pixel(0, 3), None);
    }

    #[test]
    fn filled_buffer_repeats_the_pixel() {
        let buffer = PixelBuffer::filled(3, 2, Pixel::new(1, 2, 3, 255));
        assert_eq!(buffer.pixel_count(), 6);
        assert!(buffer.pixels().all(|p| p == Pixel::new(1, 2, 3, 255)));
    }

    #[test]
    fn downscale_produces_the_requested_dimensions() {
        let full = PixelBuffer::filled(640, 480, Pixel::new(100, 150, 200, 255));
        let small = full.downscale(64, 48).unwrap();

        assert!(small.has_dimensions(64, 48));
        assert_eq!(small.as_bytes().len(), 64 * 48 * 4);
        // A flat image stays flat under bilinear resampling.
        assert_eq!(small.pixel(10, 10), Some(Pixel::new(100, 150, 200, 255)));
    }

    #[test]
    fn downscale_to_same_size_is_a_copy() {
        let buffer = PixelBuffer::filled(8, 6, Pixel::new(5, 5, 5, 255));
        assert_eq!(buffer.downscale(8, 6).unwrap(), buffer);
        assert!(buffer.downscale(0, 6).is_err());
    }

    #[test]
    fn converts_through_rgba_image() {
        let mut buffer = PixelBuffer::blank(2, 2);
        buffer.set_pixel(1, 1, Pixel::new(10, 20, 30, 40));

        let image = buffer.to_rgba_image();
        assert_eq!(image.get_pixel(1, 1).0, [10, 20, 30, 40]);
        assert_eq!(PixelBuffer::from(image), buffer);
    }
}
