pub mod image_helper {
    use crate::core_modules::pixel_buffer::PixelBuffer;
    use crate::error::Result;
    use image::ImageEncoder;
    use std::path::Path;

    /// Writes `buffer` to `path` as an RGBA PNG.
    pub fn save(path: &Path, buffer: &PixelBuffer) -> Result<()> {
        let output = std::io::BufWriter::new(std::fs::File::create(path)?);
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(
            buffer.as_bytes(),
            buffer.width(),
            buffer.height(),
            image::ExtendedColorType::Rgba8,
        )?;

        Ok(())
    }

    /// Encodes `buffer` as PNG bytes in memory.
    pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        image::codecs::png::PngEncoder::new(&mut bytes).write_image(
            buffer.as_bytes(),
            buffer.width(),
            buffer.height(),
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(bytes)
    }

    /// Decodes any format `image` understands into an RGBA buffer.
    pub fn load(path: &Path) -> Result<PixelBuffer> {
        let decoded = image::open(path)?;
        Ok(PixelBuffer::from(decoded.into_rgba8()))
    }
}
