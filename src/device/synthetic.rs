//! Synthetic device (`stub://`).
//!
//! Runs one producer thread per enabled channel, each posting into a
//! single-slot [`Mailbox`] at the configured frame rate. The scene is a
//! gradient with a bright square sweeping across it; the depth plane places
//! the square in front of a receding background, and the detection channel
//! emits a few random objects filtered the way the camera's network filters
//! them (confidence threshold, 100–5000 mm spatial range).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::{Rgb, RgbImage};

use super::{
    DeviceInfo, DeviceSession, Mailbox, PipelineSpec, DEPTH_LOWER_MM, DEPTH_RESOLUTION,
    DEPTH_UPPER_MM,
};
use crate::config::Resolution;
use crate::detect::{Detection, NormalizedBox, SpatialPoint, LABELS};
use crate::error::{Error, Result};
use crate::frame::{ColorFrame, DepthFrame};

pub struct SyntheticDevice {
    url: String,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    color: Mailbox<ColorFrame>,
    depth: Mailbox<DepthFrame>,
    detections: Mailbox<Vec<Detection>>,
    closed: bool,
}

impl SyntheticDevice {
    pub fn start(url: &str, spec: &PipelineSpec) -> Result<Self> {
        let mut device = Self {
            url: url.to_string(),
            stop: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
            color: Mailbox::new(),
            depth: Mailbox::new(),
            detections: Mailbox::new(),
            closed: false,
        };
        let period = Duration::from_secs_f64(1.0 / spec.fps.max(1) as f64);

        let color_res = spec.color_resolution;
        let color = device.color.clone();
        device.spawn("color", period, color, move |seq| {
            Some(ColorFrame::new(render_scene(color_res, seq), seq))
        })?;

        if spec.depth {
            let depth = device.depth.clone();
            device.spawn("depth", period, depth, move |seq| {
                DepthFrame::new(
                    DEPTH_RESOLUTION.width,
                    DEPTH_RESOLUTION.height,
                    render_depth(DEPTH_RESOLUTION, seq),
                    seq,
                )
                .ok()
            })?;
        }

        if spec.detections {
            let threshold = spec.confidence_threshold;
            let mut rng = StdRng::seed_from_u64(0x0AD0);
            let detections = device.detections.clone();
            device.spawn("detections", period, detections, move |_| {
                Some(random_detections(&mut rng, threshold))
            })?;
        }

        log::info!(
            "SyntheticDevice: opened {} ({}x{} @ {} fps, depth={}, detections={})",
            url,
            color_res.width,
            color_res.height,
            spec.fps,
            spec.depth,
            spec.detections
        );
        Ok(device)
    }

    fn spawn<T, F>(&mut self, channel: &str, period: Duration, mailbox: Mailbox<T>, mut produce: F) -> Result<()>
    where
        T: Send + 'static,
        F: FnMut(u64) -> Option<T> + Send + 'static,
    {
        let stop = Arc::clone(&self.stop);
        let handle = thread::Builder::new()
            .name(format!("synthetic-{channel}"))
            .spawn(move || {
                let mut sequence = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    if let Some(item) = produce(sequence) {
                        mailbox.post(item);
                    }
                    sequence += 1;
                    thread::sleep(period);
                }
            })?;
        self.workers.push(handle);
        Ok(())
    }

    fn shutdown_workers(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Relaxed);
        let mut panicked = 0;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            return Err(Error::device(format!("{panicked} producer thread(s) panicked")));
        }
        Ok(())
    }
}

impl DeviceSession for SyntheticDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("synthetic ({})", self.url),
            usb_speed: "SUPER".to_string(),
            connected_cameras: vec!["RGB".to_string(), "LEFT".to_string(), "RIGHT".to_string()],
            stereo_pairs: vec![("LEFT".to_string(), "RIGHT".to_string())],
        }
    }

    fn try_color(&mut self) -> Result<Option<ColorFrame>> {
        Ok(self.color.take())
    }

    fn try_depth(&mut self) -> Result<Option<DepthFrame>> {
        Ok(self.depth.take())
    }

    fn try_detections(&mut self) -> Result<Option<Vec<Detection>>> {
        Ok(self.detections.take())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.shutdown_workers();
        log::info!("SyntheticDevice: closed {}", self.url);
        result
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.shutdown_workers();
        }
    }
}

// ----------------------------------------------------------------------------
// Scene generation
// ----------------------------------------------------------------------------

fn square_geometry(width: u32, height: u32, sequence: u64) -> (u32, u32, u32) {
    let size = (width.min(height) / 5).max(1);
    let travel = width.saturating_sub(size).max(1) as u64;
    let x = ((sequence * 8) % travel) as u32;
    let y = height.saturating_sub(size) / 2;
    (x, y, size)
}

fn render_scene(resolution: Resolution, sequence: u64) -> RgbImage {
    let Resolution { width, height } = resolution;
    let (sx, sy, size) = square_geometry(width, height, sequence);
    let blue = ((sequence * 4) % 256) as u8;
    RgbImage::from_fn(width, height, |x, y| {
        if x >= sx && x < sx + size && y >= sy && y < sy + size {
            Rgb([250, 250, 250])
        } else {
            Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                blue,
            ])
        }
    })
}

fn render_depth(resolution: Resolution, sequence: u64) -> Vec<u16> {
    let Resolution { width, height } = resolution;
    let (sx, sy, size) = square_geometry(width, height, sequence);
    let mut data = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let mm = if x < 4 {
                // left-edge occlusion band, no disparity
                0
            } else if x >= sx && x < sx + size && y >= sy && y < sy + size {
                800
            } else {
                1000 + (x * 3000 / width.max(1)) as u16
            };
            data.push(mm);
        }
    }
    data
}

fn random_detections(rng: &mut StdRng, threshold: f32) -> Vec<Detection> {
    let count = rng.gen_range(0..=3);
    (0..count)
        .filter_map(|_| {
            let confidence: f32 = rng.gen_range(0.2..1.0);
            let xmin: f32 = rng.gen_range(0.0..0.7);
            let ymin: f32 = rng.gen_range(0.0..0.7);
            let w: f32 = rng.gen_range(0.1..0.3);
            let h: f32 = rng.gen_range(0.1..0.3);
            let z_mm: f32 = rng.gen_range(0.0..6000.0);
            let detection = Detection {
                label: rng.gen_range(1..LABELS.len()),
                confidence,
                bbox: NormalizedBox::new(xmin, ymin, xmin + w, ymin + h),
                spatial: SpatialPoint::new(
                    rng.gen_range(-1000.0..1000.0),
                    rng.gen_range(-500.0..500.0),
                    z_mm,
                ),
            };
            let in_range = (DEPTH_LOWER_MM..=DEPTH_UPPER_MM).contains(&z_mm);
            (confidence >= threshold && in_range).then_some(detection)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn spec(depth: bool, detections: bool) -> PipelineSpec {
        PipelineSpec {
            color_resolution: Resolution::new(64, 48),
            fps: 200,
            depth,
            detections,
            confidence_threshold: 0.5,
        }
    }

    fn poll_until<T>(mut f: impl FnMut() -> Result<Option<T>>) -> Option<T> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Ok(Some(item)) = f() {
                return Some(item);
            }
            thread::sleep(Duration::from_millis(2));
        }
        None
    }

    #[test]
    fn produces_frames_at_requested_size() -> Result<()> {
        let mut device = SyntheticDevice::start("stub://test", &spec(true, false))?;
        let color = poll_until(|| device.try_color()).expect("colour frame");
        assert_eq!(color.dimensions(), (64, 48));
        let depth = poll_until(|| device.try_depth()).expect("depth frame");
        assert_eq!((depth.width(), depth.height()), (640, 400));
        assert_eq!(depth.depth_at(0, 0), Some(0));
        device.close()?;
        device.close()?;
        Ok(())
    }

    #[test]
    fn disabled_channels_stay_empty() -> Result<()> {
        let mut device = SyntheticDevice::start("stub://test", &spec(false, false))?;
        poll_until(|| device.try_color()).expect("colour frame");
        assert!(device.try_depth()?.is_none());
        assert!(device.try_detections()?.is_none());
        device.close()
    }

    #[test]
    fn detections_respect_threshold_and_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            for det in random_detections(&mut rng, 0.6) {
                assert!(det.confidence >= 0.6);
                assert!(det.spatial.z_mm >= DEPTH_LOWER_MM && det.spatial.z_mm <= DEPTH_UPPER_MM);
                assert!(det.label >= 1 && det.label < LABELS.len());
            }
        }
    }
}
