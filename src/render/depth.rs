use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};

use crate::config::{DepthSettings, Resolution};
use crate::frame::DepthFrame;

/// Convert a millimetre depth plane into a colourised preview at `target` size.
///
/// Steps, each optional per `settings` except the colormap:
/// scale so the farthest reading maps to 255, histogram-equalise, colormap,
/// resize to the colour resolution.
pub fn colorize_depth(depth: &DepthFrame, settings: &DepthSettings, target: Resolution) -> RgbImage {
    let mut gray = to_gray(depth, settings.normalize);
    if settings.equalize_hist {
        equalize_hist(&mut gray);
    }

    let lut = settings.colormap.lut();
    let mut colored = RgbImage::new(gray.width(), gray.height());
    for (src, dst) in gray.pixels().zip(colored.pixels_mut()) {
        *dst = lut[src.0[0] as usize];
    }

    if colored.dimensions() == (target.width, target.height) {
        colored
    } else {
        imageops::resize(&colored, target.width, target.height, FilterType::Nearest)
    }
}

fn to_gray(depth: &DepthFrame, normalize: bool) -> GrayImage {
    let max = depth.max_mm() as u32;
    let mut gray = GrayImage::new(depth.width(), depth.height());
    for (value, px) in depth.data().iter().zip(gray.pixels_mut()) {
        let v = *value as u32;
        let scaled = if !normalize {
            v.min(255)
        } else if max == 0 {
            0
        } else {
            (v * 255 + max / 2) / max
        };
        *px = Luma([scaled as u8]);
    }
    gray
}

/// In-place histogram equalisation of an 8-bit image.
pub fn equalize_hist(img: &mut GrayImage) {
    let total = (img.width() * img.height()) as u64;
    if total == 0 {
        return;
    }
    let mut hist = [0u64; 256];
    for px in img.pixels() {
        hist[px.0[0] as usize] += 1;
    }

    let Some(first) = hist.iter().position(|&count| count > 0) else {
        return;
    };
    let mut lut = [0u8; 256];
    if hist[first] == total {
        // single intensity: nothing to spread
        lut.iter_mut().for_each(|v| *v = first as u8);
    } else {
        let scale = 255.0 / (total - hist[first]) as f64;
        let mut sum = 0u64;
        for i in (first + 1)..256 {
            sum += hist[i];
            lut[i] = ((sum as f64 * scale).round()).clamp(0.0, 255.0) as u8;
        }
    }

    for px in img.pixels_mut() {
        px.0[0] = lut[px.0[0] as usize];
    }
}
