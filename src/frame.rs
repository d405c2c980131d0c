//! Frame payloads delivered by the device channels.
//!
//! - `ColorFrame`: 8-bit RGB image with capture metadata.
//! - `DepthFrame`: 16-bit depth plane in millimetres, aligned to the colour camera.
//!
//! Both are immutable once created. Consumers that need to annotate a frame
//! work on a copy (`ColorFrame::to_image`), never on the received buffer.

use image::RgbImage;
use std::time::Instant;

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct ColorFrame {
    image: RgbImage,
    sequence: u64,
    captured_at: Instant,
}

impl ColorFrame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self {
            image,
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Build a frame from tightly packed RGB24 bytes.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = expected_len(width, height, 3)?;
        if pixels.len() != expected {
            return Err(Error::device(format!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            )));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| Error::device("RGB buffer does not match frame dimensions"))?;
        Ok(Self::new(image, sequence))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Owned copy of the pixels, for drawing on.
    pub fn to_image(&self) -> RgbImage {
        self.image.clone()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

#[derive(Clone, Debug)]
pub struct DepthFrame {
    width: u32,
    height: u32,
    data: Vec<u16>,
    sequence: u64,
}

impl DepthFrame {
    /// `data` is row-major, one millimetre value per pixel (0 = no measurement).
    pub fn new(width: u32, height: u32, data: Vec<u16>, sequence: u64) -> Result<Self> {
        let expected = expected_len(width, height, 1)?;
        if data.len() != expected {
            return Err(Error::device(format!(
                "depth frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            sequence,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u16] {
        &self.data
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn depth_at(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }

    pub fn max_mm(&self) -> u16 {
        self.data.iter().copied().max().unwrap_or(0)
    }
}

fn expected_len(width: u32, height: u32, channels: u32) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(channels))
        .map(|v| v as usize)
        .ok_or_else(|| Error::device("frame dimensions overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_frame_validates_length() {
        assert!(ColorFrame::from_rgb(vec![0; 12], 2, 2, 1).is_ok());
        assert!(ColorFrame::from_rgb(vec![0; 11], 2, 2, 1).is_err());
    }

    #[test]
    fn depth_frame_lookup() -> Result<()> {
        let depth = DepthFrame::new(2, 2, vec![100, 200, 300, 400], 7)?;
        assert_eq!(depth.depth_at(1, 1), Some(400));
        assert_eq!(depth.depth_at(2, 0), None);
        assert_eq!(depth.max_mm(), 400);
        assert_eq!(depth.sequence(), 7);
        Ok(())
    }

    #[test]
    fn to_image_is_a_copy() {
        let frame = ColorFrame::new(RgbImage::new(4, 4), 0);
        let mut copy = frame.to_image();
        copy.put_pixel(0, 0, image::Rgb([9, 9, 9]));
        assert_eq!(frame.image().get_pixel(0, 0).0, [0, 0, 0]);
    }
}
