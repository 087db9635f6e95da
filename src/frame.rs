use crate::error::AuthError;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, ColorType, RgbaImage};
use std::time::SystemTime;

/// Raw RGBA pixels as handed over by a camera backend
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba,
        }
    }

    /// Check that the pixel data covers width x height x 4 bytes
    pub fn is_complete(&self) -> bool {
        self.rgba.len() == self.width as usize * self.height as usize * 4
    }
}

/// Mutable RGBA snapshot of one video frame, owned for a single scan cycle
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Sequence number within the session
    pub id: u64,
    /// Capture time
    pub timestamp: SystemTime,
    image: RgbaImage,
}

impl FrameBuffer {
    pub fn new(id: u64, image: RgbaImage) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            image,
        }
    }

    /// Build a frame from raw pixels, returning None when the buffer is short
    pub fn from_raw(id: u64, raw: RawFrame) -> Option<Self> {
        RgbaImage::from_raw(raw.width, raw.height, raw.rgba).map(|image| Self::new(id, image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn as_rgba(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Scale the raster by an integer factor
    pub fn upscale(&mut self, factor: u32) {
        if factor <= 1 {
            return;
        }
        self.image = imageops::resize(
            &self.image,
            self.image.width() * factor,
            self.image.height() * factor,
            imageops::FilterType::Triangle,
        );
    }

    /// Encode the frame as JPEG for submission
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, AuthError> {
        // JPEG carries no alpha, so drop it before encoding
        let rgb: Vec<u8> = self
            .image
            .pixels()
            .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
            .collect();

        let mut jpeg_data = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_data, quality);
        encoder
            .encode(&rgb, self.width(), self.height(), ColorType::Rgb8)
            .map_err(|e| AuthError::Encode {
                details: format!("JPEG encoding failed: {}", e),
            })?;

        Ok(jpeg_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_rejects_short_buffer() {
        let raw = RawFrame::new(4, 4, vec![0u8; 10]);
        assert!(!raw.is_complete());
        assert!(FrameBuffer::from_raw(0, raw).is_none());
    }

    #[test]
    fn test_upscale_doubles_dimensions() {
        let raw = RawFrame::new(8, 6, vec![128u8; 8 * 6 * 4]);
        let mut frame = FrameBuffer::from_raw(1, raw).unwrap();
        frame.upscale(2);
        assert_eq!((frame.width(), frame.height()), (16, 12));
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg_markers() {
        let raw = RawFrame::new(16, 16, vec![200u8; 16 * 16 * 4]);
        let frame = FrameBuffer::from_raw(1, raw).unwrap();
        let jpeg = frame.encode_jpeg(90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}
