//! Detection overlay.
//!
//! Produces an annotated copy of a colour frame: one box and label per
//! detection, plus an optional semi-transparent info panel in the top-right
//! corner listing every object with its distance in metres.
//!
//! The panel grows by one row per object. When the frame is too short to hold
//! every row, the panel is truncated and its last visible row reads `+K more`.

use image::RgbImage;

use crate::detect::Detection;
use crate::frame::ColorFrame;
use crate::render::{blend_rect, draw_box, draw_label, BLACK, GREEN, WHITE};

pub const PANEL_PADDING: i32 = 10;
pub const PANEL_LINE_HEIGHT: i32 = 25;
pub const PANEL_WIDTH: i32 = 300;
/// Weight of the dark panel colour; the frame keeps the remainder.
pub const PANEL_ALPHA: f32 = 0.6;
pub const PANEL_TITLE: &str = "Detected Objects:";

const BOX_THICKNESS: u32 = 2;
const TEXT_SCALE: u32 = 2;

#[derive(Clone, Copy, Debug)]
pub struct OverlayOptions {
    pub display_info: bool,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self { display_info: true }
    }
}

/// Text drawn next to each bounding box.
pub fn box_label(detection: &Detection) -> String {
    format!("{} {:.2}", detection.label_name(), detection.confidence)
}

/// One info-panel row.
pub fn panel_line(detection: &Detection) -> String {
    format!(
        "{} ({:.2}) - {:.2}m",
        detection.label_name(),
        detection.confidence,
        detection.spatial.z_m()
    )
}

/// Geometry and text of the info panel for a given frame size.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelLayout {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub text_x: i32,
    /// (text, baseline y); the first row is the title.
    pub rows: Vec<(String, i32)>,
}

impl PanelLayout {
    pub fn compute(frame_width: u32, frame_height: u32, detections: &[Detection]) -> Option<Self> {
        if detections.is_empty() {
            return None;
        }
        let width = frame_width as i32;
        let height = frame_height as i32;
        let baseline = |row: usize| PANEL_PADDING + PANEL_LINE_HEIGHT * (row as i32 + 2);

        // object rows whose baseline stays inside the frame
        let capacity = (0..detections.len())
            .take_while(|&row| baseline(row) <= height - PANEL_PADDING)
            .count();

        let mut rows = vec![(PANEL_TITLE.to_string(), PANEL_PADDING + PANEL_LINE_HEIGHT)];
        if capacity >= detections.len() {
            rows.extend(
                detections
                    .iter()
                    .enumerate()
                    .map(|(row, det)| (panel_line(det), baseline(row))),
            );
        } else if capacity > 0 {
            let shown = capacity - 1;
            rows.extend(
                detections[..shown]
                    .iter()
                    .enumerate()
                    .map(|(row, det)| (panel_line(det), baseline(row))),
            );
            rows.push((
                format!("+{} more", detections.len() - shown),
                baseline(shown),
            ));
        }

        let object_rows = rows.len() as i32 - 1;
        let bottom = (PANEL_PADDING * 2 + PANEL_LINE_HEIGHT * (object_rows + 1)).min(height);
        Some(Self {
            left: (width - PANEL_WIDTH - PANEL_PADDING).max(0),
            top: PANEL_PADDING,
            right: (width - PANEL_PADDING).max(0),
            bottom,
            text_x: (width - PANEL_WIDTH).max(0),
            rows,
        })
    }
}

/// Annotated copy of `frame`. The input is never modified.
pub fn annotate(frame: &ColorFrame, detections: &[Detection], options: &OverlayOptions) -> RgbImage {
    let mut canvas = frame.to_image();
    annotate_in_place(&mut canvas, detections, options);
    canvas
}

/// Draw boxes, labels and the info panel onto `canvas`.
pub fn annotate_in_place(canvas: &mut RgbImage, detections: &[Detection], options: &OverlayOptions) {
    let (width, height) = canvas.dimensions();

    for detection in detections {
        let b = detection.bbox.to_pixels(width, height);
        draw_box(canvas, (b.x1, b.y1), (b.x2, b.y2), GREEN, BOX_THICKNESS);
        draw_label(canvas, &box_label(detection), b.x1 + 5, b.y1 + 20, TEXT_SCALE, WHITE);
    }

    if !options.display_info {
        return;
    }
    let Some(panel) = PanelLayout::compute(width, height, detections) else {
        return;
    };
    blend_rect(
        canvas,
        (panel.left, panel.top),
        (panel.right, panel.bottom),
        BLACK,
        PANEL_ALPHA,
    );
    for (text, baseline) in &panel.rows {
        draw_label(canvas, text, panel.text_x, *baseline, TEXT_SCALE, WHITE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{NormalizedBox, SpatialPoint};
    use image::Rgb;

    fn det(label: usize, confidence: f32, z_mm: f32) -> Detection {
        Detection {
            label,
            confidence,
            bbox: NormalizedBox::new(0.1, 0.1, 0.4, 0.4),
            spatial: SpatialPoint::new(0.0, 0.0, z_mm),
        }
    }

    fn gray_frame(width: u32, height: u32) -> ColorFrame {
        ColorFrame::new(RgbImage::from_pixel(width, height, Rgb([120, 120, 120])), 1)
    }

    #[test]
    fn panel_rows_report_meters() {
        let panel = PanelLayout::compute(640, 480, &[det(15, 0.87, 1500.0), det(7, 0.5, 2500.0)]).unwrap();
        assert_eq!(panel.rows[0].0, PANEL_TITLE);
        assert_eq!(panel.rows[1].0, "person (0.87) - 1.50m");
        assert_eq!(panel.rows[2].0, "car (0.50) - 2.50m");
        assert_eq!(panel.rows[1].1, 60);
        assert_eq!(panel.bottom, 20 + 25 * 3);
        assert_eq!((panel.left, panel.right, panel.text_x), (330, 630, 340));
    }

    #[test]
    fn no_panel_without_detections() {
        assert!(PanelLayout::compute(640, 480, &[]).is_none());
    }

    #[test]
    fn panel_truncates_with_overflow_row() {
        let detections: Vec<_> = (0..20).map(|i| det(15, 0.9, 1000.0 + i as f32)).collect();
        let panel = PanelLayout::compute(400, 120, &detections).unwrap();
        // baselines 60, 85 and 110 fit within 120 - 10; the last becomes the overflow row
        assert_eq!(panel.rows.len(), 4);
        assert_eq!(panel.rows[2].1, 85);
        assert_eq!(panel.rows[3].0, "+18 more");
        assert!(panel.bottom <= 120);
    }

    #[test]
    fn zero_detections_pass_through() {
        let frame = gray_frame(64, 48);
        let out = annotate(&frame, &[], &OverlayOptions::default());
        assert_eq!(out.as_raw(), frame.image().as_raw());
    }

    #[test]
    fn input_frame_is_untouched() {
        let frame = gray_frame(400, 300);
        let out = annotate(&frame, &[det(15, 0.9, 1200.0)], &OverlayOptions::default());
        assert!(frame.image().pixels().all(|p| p.0 == [120, 120, 120]));
        assert_ne!(out.as_raw(), frame.image().as_raw());
    }

    #[test]
    fn panel_darkens_top_right() {
        let frame = gray_frame(400, 300);
        let out = annotate(&frame, &[det(15, 0.9, 1200.0)], &OverlayOptions::default());
        // inside the panel, away from text: 0.4 * 120
        assert_eq!(out.get_pixel(385, 12).0, [48, 48, 48]);
    }

    #[test]
    fn display_info_off_skips_panel() {
        let frame = gray_frame(400, 300);
        let out = annotate(
            &frame,
            &[det(15, 0.9, 1200.0)],
            &OverlayOptions { display_info: false },
        );
        assert_eq!(out.get_pixel(385, 12).0, [120, 120, 120]);
        // box corner at (40, 30)
        assert_eq!(out.get_pixel(40, 30).0, GREEN.0);
    }

    #[test]
    fn malformed_boxes_stay_in_bounds() {
        let frame = gray_frame(100, 100);
        let mut wild = det(15, 0.9, 1000.0);
        wild.bbox = NormalizedBox::new(-0.1, 1.2, 0.5, 0.5);
        let out = annotate(&frame, &[wild], &OverlayOptions { display_info: false });
        assert_eq!(out.dimensions(), (100, 100));
    }
}
