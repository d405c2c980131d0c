//! Drawing primitives shared by the overlay engine and the mode runners.

mod colormap;
mod depth;
pub mod font;

pub use colormap::Colormap;
pub use depth::{colorize_depth, equalize_hist};
pub use font::{draw_text, text_size};

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

/// Draw a rectangle outline between two corners, `thickness` pixels wide,
/// growing inward. Degenerate boxes are drawn as a single line or point.
pub fn draw_box(img: &mut RgbImage, (x1, y1): (i32, i32), (x2, y2): (i32, i32), color: Rgb<u8>, thickness: u32) {
    let (left, right) = (x1.min(x2), x1.max(x2));
    let (top, bottom) = (y1.min(y2), y1.max(y2));
    for inset in 0..thickness.max(1) as i32 {
        let width = right - left - 2 * inset + 1;
        let height = bottom - top - 2 * inset + 1;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(left + inset, top + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(img, rect, color);
    }
}

/// Blend a filled rectangle into the image: `alpha * color + (1 - alpha) * pixel`.
/// The rectangle is clipped to the image bounds.
pub fn blend_rect(img: &mut RgbImage, (x1, y1): (i32, i32), (x2, y2): (i32, i32), color: Rgb<u8>, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let x_start = x1.min(x2).max(0) as u32;
    let y_start = y1.min(y2).max(0) as u32;
    let x_end = (x1.max(x2).max(0) as u32).min(img.width());
    let y_end = (y1.max(y2).max(0) as u32).min(img.height());

    for y in y_start..y_end {
        for x in x_start..x_end {
            let px = img.get_pixel_mut(x, y);
            for c in 0..3 {
                let blended = alpha * color.0[c] as f32 + (1.0 - alpha) * px.0[c] as f32;
                px.0[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Draw `text` so its baseline sits at `baseline_y`, scaled glyphs.
pub fn draw_label(img: &mut RgbImage, text: &str, x: i32, baseline_y: i32, scale: u32, color: Rgb<u8>) {
    let (_, height) = text_size(text, scale);
    draw_text(img, text, x, baseline_y - height as i32, scale, color);
}

/// Wall-clock timestamp in the top-left corner of the frame.
pub fn stamp_timestamp(img: &mut RgbImage, now: chrono::DateTime<chrono::Local>) {
    let text = now.format("%Y-%m-%d %H:%M:%S").to_string();
    draw_label(img, &text, 10, 30, 2, WHITE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_mixes_sixty_forty() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        blend_rect(&mut img, (0, 0), (2, 2), BLACK, 0.6);
        assert_eq!(img.get_pixel(0, 0).0, [40, 40, 40]);
        assert_eq!(img.get_pixel(3, 3).0, [100, 100, 100]);
    }

    #[test]
    fn blend_clips_to_bounds() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        blend_rect(&mut img, (-10, -10), (40, 40), BLACK, 1.0);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn box_outline_leaves_interior() {
        let mut img = RgbImage::new(10, 10);
        draw_box(&mut img, (1, 1), (8, 8), GREEN, 2);
        assert_eq!(img.get_pixel(1, 1).0, GREEN.0);
        assert_eq!(img.get_pixel(2, 5).0, GREEN.0);
        assert_eq!(img.get_pixel(5, 5).0, [0, 0, 0]);
    }

    #[test]
    fn inverted_and_degenerate_boxes_do_not_panic() {
        let mut img = RgbImage::new(10, 10);
        draw_box(&mut img, (8, 8), (1, 1), GREEN, 2);
        draw_box(&mut img, (0, 10), (5, 5), GREEN, 2);
        draw_box(&mut img, (3, 3), (3, 3), GREEN, 1);
        assert_eq!(img.get_pixel(3, 3).0, GREEN.0);
    }

    #[test]
    fn timestamp_draws_pixels() {
        let mut img = RgbImage::new(320, 40);
        stamp_timestamp(&mut img, chrono::Local::now());
        assert!(img.pixels().any(|p| p.0 == WHITE.0));
    }
}
