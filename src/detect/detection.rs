use super::labels::label_name;

/// Bounding box in frame-relative coordinates. Values are expected in [0, 1]
/// but upstream data is not trusted to respect that.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl NormalizedBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Every coordinate clamped to [0, 1]; NaN becomes 0.
    pub fn clamped(&self) -> Self {
        let clamp = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self {
            xmin: clamp(self.xmin),
            ymin: clamp(self.ymin),
            xmax: clamp(self.xmax),
            ymax: clamp(self.ymax),
        }
    }

    /// Pixel coordinates: x scaled by `width`, y by `height`, after clamping.
    /// Fractions are truncated.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelBox {
        let b = self.clamped();
        PixelBox {
            x1: (b.xmin * width as f32) as i32,
            y1: (b.ymin * height as f32) as i32,
            x2: (b.xmax * width as f32) as i32,
            y2: (b.ymax * height as f32) as i32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

/// Object position relative to the camera, in millimetres.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpatialPoint {
    pub x_mm: f32,
    pub y_mm: f32,
    pub z_mm: f32,
}

impl SpatialPoint {
    pub fn new(x_mm: f32, y_mm: f32, z_mm: f32) -> Self {
        Self { x_mm, y_mm, z_mm }
    }

    /// Distance along the optical axis, in metres.
    pub fn z_m(&self) -> f32 {
        self.z_mm / 1000.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Index into [`LABELS`](super::LABELS).
    pub label: usize,
    pub confidence: f32,
    pub bbox: NormalizedBox,
    pub spatial: SpatialPoint,
}

impl Detection {
    pub fn label_name(&self) -> &'static str {
        label_name(self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_before_scaling() {
        let bbox = NormalizedBox::new(-0.1, 1.2, 0.5, 0.5);
        assert_eq!(
            bbox.to_pixels(100, 100),
            PixelBox {
                x1: 0,
                y1: 100,
                x2: 50,
                y2: 50
            }
        );
    }

    #[test]
    fn scales_x_by_width_and_y_by_height() {
        let bbox = NormalizedBox::new(0.25, 0.25, 0.75, 0.75);
        assert_eq!(
            bbox.to_pixels(200, 100),
            PixelBox {
                x1: 50,
                y1: 25,
                x2: 150,
                y2: 75
            }
        );
    }

    #[test]
    fn nan_coordinates_collapse_to_zero() {
        let bbox = NormalizedBox::new(f32::NAN, 0.5, 1.0, f32::NAN).clamped();
        assert_eq!(bbox.xmin, 0.0);
        assert_eq!(bbox.ymax, 0.0);
    }

    #[test]
    fn distance_in_meters() {
        let p = SpatialPoint::new(250.0, -500.0, 1500.0);
        assert_eq!(p.z_m(), 1.5);
    }
}
