//! Video frame types and processing

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageBuffer, Rgb, RgbImage};

use crate::CameraError;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds since the source opened)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u64,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        timestamp_ns: u64,
        sequence: u64,
    ) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CameraError::Format(format!(
                "expected {} bytes for {}x{} RGB, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        })
    }

    /// Build a frame from a decoded image
    pub fn from_rgb_image(image: RgbImage, timestamp_ns: u64, sequence: u64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Borrow the pixel data as an image view
    pub fn view(&self) -> Option<ImageBuffer<Rgb<u8>, &[u8]>> {
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
    }

    /// Convert into an owned image for drawing
    pub fn into_rgb_image(self) -> Result<RgbImage, CameraError> {
        let (width, height) = (self.width, self.height);
        RgbImage::from_raw(width, height, self.data)
            .ok_or_else(|| {
                CameraError::Format(format!("buffer too small for {}x{}", width, height))
            })
    }

    /// Mirror the frame horizontally in place
    pub fn mirror(&mut self) {
        let row_len = self.width as usize * 3;
        if row_len == 0 {
            return;
        }
        for row in self.data.chunks_exact_mut(row_len) {
            let w = self.width as usize;
            for x in 0..w / 2 {
                let (l, r) = (x * 3, (w - 1 - x) * 3);
                for c in 0..3 {
                    row.swap(l + c, r + c);
                }
            }
        }
    }

    /// Encode the frame as a baseline JPEG
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, CameraError> {
        let mut out = Vec::with_capacity(self.data.len() / 8);
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder.encode(&self.data, self.width, self.height, ExtendedColorType::Rgb8)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        VideoFrame::new(data, width, height, 0, 0).unwrap()
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(VideoFrame::new(vec![0; 10], 2, 2, 0, 0).is_err());
        assert!(VideoFrame::new(vec![0; 12], 2, 2, 0, 0).is_ok());
    }

    #[test]
    fn test_mirror() {
        let mut frame = gradient(4, 2);
        frame.mirror();
        assert_eq!(frame.get_pixel(0, 0), Some([3, 0, 0]));
        assert_eq!(frame.get_pixel(3, 1), Some([0, 1, 0]));
        assert_eq!(frame.get_pixel(1, 1), Some([2, 1, 0]));
    }

    #[test]
    fn test_mirror_odd_width_keeps_center() {
        let mut frame = gradient(3, 1);
        frame.mirror();
        assert_eq!(frame.get_pixel(1, 0), Some([1, 0, 0]));
        assert_eq!(frame.get_pixel(0, 0), Some([2, 0, 0]));
    }

    #[test]
    fn test_encode_jpeg() {
        let frame = gradient(16, 16);
        let jpeg = frame.encode_jpeg(90).unwrap();
        // SOI and EOI markers
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_rgb_image_round_trip_dimensions() {
        let frame = gradient(5, 3);
        let image = frame.clone().into_rgb_image().unwrap();
        assert_eq!(image.dimensions(), (5, 3));
        let back = VideoFrame::from_rgb_image(image, 7, 9);
        assert_eq!(back.sequence, 9);
        assert_eq!(back.data, frame.data);
    }

    proptest::proptest! {
        #[test]
        fn prop_mirror_twice_is_identity(width in 1u32..24, height in 1u32..8, seed in 0u8..255) {
            let data: Vec<u8> = (0..width * height * 3)
                .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
                .collect();
            let original = VideoFrame::new(data, width, height, 0, 0).unwrap();
            let mut frame = original.clone();
            frame.mirror();
            proptest::prop_assert_eq!(frame.get_pixel(0, 0), original.get_pixel(width - 1, 0));
            frame.mirror();
            proptest::prop_assert_eq!(frame.data, original.data);
        }
    }
}
