//! Stream synchronizer.
//!
//! Keeps the latest payload seen on each device channel. Every `poll` drains
//! at most one item per channel without waiting; channels with nothing new keep
//! their previous value. A frame is renderable as soon as colour has arrived
//! once; depth and detections are optional extras.

use std::thread;
use std::time::{Duration, Instant};

use crate::detect::Detection;
use crate::device::DeviceSession;
use crate::error::{Error, Result};
use crate::frame::{ColorFrame, DepthFrame};
use crate::shutdown::ShutdownController;

/// Which channels delivered something on the last poll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollUpdate {
    pub color: bool,
    pub depth: bool,
    pub detections: bool,
}

impl PollUpdate {
    pub fn any(&self) -> bool {
        self.color || self.depth || self.detections
    }
}

#[derive(Default)]
pub struct StreamSynchronizer {
    color: Option<ColorFrame>,
    depth: Option<DepthFrame>,
    detections: Option<Vec<Detection>>,
}

impl StreamSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking read of every channel; new items replace stored state.
    pub fn poll(&mut self, device: &mut dyn DeviceSession) -> Result<PollUpdate> {
        let mut update = PollUpdate::default();
        if let Some(frame) = device.try_color()? {
            self.color = Some(frame);
            update.color = true;
        }
        if let Some(frame) = device.try_depth()? {
            self.depth = Some(frame);
            update.depth = true;
        }
        if let Some(batch) = device.try_detections()? {
            self.detections = Some(batch);
            update.detections = true;
        }
        Ok(update)
    }

    pub fn is_renderable(&self) -> bool {
        self.color.is_some()
    }

    pub fn color(&self) -> Option<&ColorFrame> {
        self.color.as_ref()
    }

    pub fn depth(&self) -> Option<&DepthFrame> {
        self.depth.as_ref()
    }

    /// `None` until the first batch arrives; an empty slice is a batch with
    /// no objects in it.
    pub fn detections(&self) -> Option<&[Detection]> {
        self.detections.as_deref()
    }

    /// Detections to draw this tick, empty when none have arrived.
    pub fn detections_or_empty(&self) -> &[Detection] {
        self.detections().unwrap_or(&[])
    }

    /// Poll until a colour frame is stored or `timeout` elapses.
    ///
    /// Returns `Ok(None)` as soon as `controller` asks to stop, so an
    /// interrupt during the wait ends the run instead of failing it.
    pub fn wait_for_first_color(
        &mut self,
        device: &mut dyn DeviceSession,
        timeout: Duration,
        poll_interval: Duration,
        controller: &ShutdownController,
    ) -> Result<Option<&ColorFrame>> {
        let started = Instant::now();
        loop {
            if controller.should_stop() {
                log::info!("stopped while waiting for the first colour frame");
                return Ok(None);
            }
            self.poll(device)?;
            if self.color.is_some() {
                break;
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(Error::NoFrameReceived { waited });
            }
            thread::sleep(poll_interval.min(timeout - waited));
        }
        Ok(self.color.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{NormalizedBox, SpatialPoint};
    use crate::device::ScriptedDevice;
    use crate::shutdown::InterruptFlag;
    use image::RgbImage;

    fn color(seq: u64) -> ColorFrame {
        ColorFrame::new(RgbImage::new(4, 4), seq)
    }

    fn person(z_mm: f32) -> Detection {
        Detection {
            label: 15,
            confidence: 0.9,
            bbox: NormalizedBox::new(0.1, 0.1, 0.5, 0.5),
            spatial: SpatialPoint::new(0.0, 0.0, z_mm),
        }
    }

    #[test]
    fn latest_colour_survives_detection_only_tick() -> Result<()> {
        let mut device = ScriptedDevice::new();
        let mut sync = StreamSynchronizer::new();

        device.push_color(color(1));
        let first = sync.poll(&mut device)?;
        assert!(first.color && !first.detections);

        device.push_detections(vec![person(1500.0)]);
        let second = sync.poll(&mut device)?;
        assert!(!second.color && second.detections);

        assert!(sync.is_renderable());
        assert_eq!(sync.color().map(|f| f.sequence()), Some(1));
        assert_eq!(sync.detections().map(|d| d.len()), Some(1));
        Ok(())
    }

    #[test]
    fn empty_polls_keep_absent_slots_absent() -> Result<()> {
        let mut device = ScriptedDevice::new();
        let mut sync = StreamSynchronizer::new();
        for _ in 0..3 {
            assert!(!sync.poll(&mut device)?.any());
        }
        assert!(!sync.is_renderable());
        assert!(sync.depth().is_none());
        assert!(sync.detections().is_none());
        assert!(sync.detections_or_empty().is_empty());
        Ok(())
    }

    #[test]
    fn newer_items_overwrite() -> Result<()> {
        let mut device = ScriptedDevice::new();
        let mut sync = StreamSynchronizer::new();
        device.push_color(color(1));
        sync.poll(&mut device)?;
        device.push_color(color(2));
        device.push_detections(vec![person(1000.0), person(2000.0)]);
        sync.poll(&mut device)?;
        device.push_detections(Vec::new());
        sync.poll(&mut device)?;
        assert_eq!(sync.color().map(|f| f.sequence()), Some(2));
        assert_eq!(sync.detections().map(|d| d.len()), Some(0));
        Ok(())
    }

    #[test]
    fn first_colour_wait_times_out() {
        let mut device = ScriptedDevice::new();
        let mut sync = StreamSynchronizer::new();
        let controller = ShutdownController::new(InterruptFlag::new());
        let err = sync
            .wait_for_first_color(&mut device, Duration::from_millis(30), Duration::from_millis(5), &controller)
            .err();
        assert!(matches!(err, Some(Error::NoFrameReceived { .. })));
    }

    #[test]
    fn first_colour_wait_returns_frame() -> Result<()> {
        let mut device = ScriptedDevice::new();
        device.push_color(color(9));
        let mut sync = StreamSynchronizer::new();
        let controller = ShutdownController::new(InterruptFlag::new());
        let frame = sync.wait_for_first_color(
            &mut device,
            Duration::from_secs(1),
            Duration::from_millis(5),
            &controller,
        )?;
        assert_eq!(frame.map(|f| f.sequence()), Some(9));
        Ok(())
    }

    #[test]
    fn first_colour_wait_gives_up_on_interrupt() -> Result<()> {
        let mut device = ScriptedDevice::new();
        let mut sync = StreamSynchronizer::new();
        let interrupt = InterruptFlag::new();
        interrupt.trigger();
        let controller = ShutdownController::new(interrupt);

        let started = Instant::now();
        let frame = sync.wait_for_first_color(
            &mut device,
            Duration::from_secs(5),
            Duration::from_millis(5),
            &controller,
        )?;
        assert!(frame.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
        Ok(())
    }
}
