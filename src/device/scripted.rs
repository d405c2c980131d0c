use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};

use super::{DeviceInfo, DeviceSession};
use crate::config::Resolution;
use crate::detect::Detection;
use crate::error::{Error, Result};
use crate::frame::{ColorFrame, DepthFrame};

/// Device that hands out caller-supplied payloads, one per poll.
///
/// Each `try_*` call pops the next queued item for that channel and reports
/// `None` once the queue is drained. With [`ScriptedDevice::with_color_every_poll`]
/// the colour channel never runs dry: every poll yields a fresh solid frame.
pub struct ScriptedDevice {
    color: VecDeque<ColorFrame>,
    depth: VecDeque<DepthFrame>,
    detections: VecDeque<Vec<Detection>>,
    color_every_poll: Option<Resolution>,
    fail_after_color_polls: Option<u64>,
    color_polls: u64,
    sequence: u64,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self {
            color: VecDeque::new(),
            depth: VecDeque::new(),
            detections: VecDeque::new(),
            color_every_poll: None,
            fail_after_color_polls: None,
            color_polls: 0,
            sequence: 0,
            closes: Arc::new(AtomicUsize::new(0)),
            closed: false,
        }
    }

    pub fn with_color_every_poll(mut self, resolution: Resolution) -> Self {
        self.color_every_poll = Some(resolution);
        self
    }

    /// Make the colour channel fail once it has been polled `polls` times.
    pub fn failing_after(mut self, polls: u64) -> Self {
        self.fail_after_color_polls = Some(polls);
        self
    }

    pub fn push_color(&mut self, frame: ColorFrame) -> &mut Self {
        self.color.push_back(frame);
        self
    }

    pub fn push_depth(&mut self, frame: DepthFrame) -> &mut Self {
        self.depth.push_back(frame);
        self
    }

    pub fn push_detections(&mut self, batch: Vec<Detection>) -> &mut Self {
        self.detections.push_back(batch);
        self
    }

    /// Shared counter of effective `close` calls, readable after the device
    /// has been moved into a runner.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

impl Default for ScriptedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSession for ScriptedDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "scripted".to_string(),
            usb_speed: "UNKNOWN".to_string(),
            connected_cameras: vec!["RGB".to_string()],
            stereo_pairs: Vec::new(),
        }
    }

    fn try_color(&mut self) -> Result<Option<ColorFrame>> {
        self.color_polls += 1;
        if let Some(limit) = self.fail_after_color_polls {
            if self.color_polls > limit {
                return Err(Error::device("scripted device lost the colour stream"));
            }
        }
        if let Some(frame) = self.color.pop_front() {
            return Ok(Some(frame));
        }
        Ok(self.color_every_poll.map(|res| {
            self.sequence += 1;
            let shade = (self.sequence % 256) as u8;
            ColorFrame::new(
                RgbImage::from_pixel(res.width, res.height, Rgb([shade, 64, 128])),
                self.sequence,
            )
        }))
    }

    fn try_depth(&mut self) -> Result<Option<DepthFrame>> {
        Ok(self.depth.pop_front())
    }

    fn try_detections(&mut self) -> Result<Option<Vec<Detection>>> {
        Ok(self.detections.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_in_order_then_runs_dry() -> Result<()> {
        let mut device = ScriptedDevice::new();
        device
            .push_color(ColorFrame::new(RgbImage::new(2, 2), 1))
            .push_color(ColorFrame::new(RgbImage::new(2, 2), 2));
        assert_eq!(device.try_color()?.map(|f| f.sequence()), Some(1));
        assert_eq!(device.try_color()?.map(|f| f.sequence()), Some(2));
        assert!(device.try_color()?.is_none());
        Ok(())
    }

    #[test]
    fn generated_colour_and_failure() -> Result<()> {
        let mut device = ScriptedDevice::new()
            .with_color_every_poll(Resolution::new(8, 6))
            .failing_after(2);
        assert_eq!(device.try_color()?.map(|f| f.dimensions()), Some((8, 6)));
        assert!(device.try_color()?.is_some());
        assert!(device.try_color().is_err());
        Ok(())
    }

    #[test]
    fn close_counts_once() -> Result<()> {
        let mut device = ScriptedDevice::new();
        let closes = device.close_counter();
        device.close()?;
        device.close()?;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
