//! Shutdown controller.
//!
//! Every run ends through [`ShutdownController::shutdown`], whether the loop
//! finished, the user quit, an interrupt arrived or a component failed. The
//! controller releases what the run acquired in reverse order (display,
//! recording, device), keeps going when one release fails, and reports the
//! number of frames processed. After the first call it is `Stopped` and later
//! calls return the same summary without touching anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::device::DeviceSession;
use crate::display::DisplaySurface;
use crate::error::{Error, Result};
use crate::record::RecordingSession;

/// Set from a signal handler, read by the control loop between ticks.
#[derive(Clone, Debug, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route Ctrl-C (SIGINT/SIGTERM) into a new flag. Only one handler can be
    /// installed per process.
    pub fn install_ctrlc() -> Result<Self> {
        let flag = Self::new();
        let handler_flag = flag.clone();
        ctrlc::set_handler(move || {
            handler_flag.trigger();
        })
        .map_err(|e| Error::InterruptHandler(e.to_string()))?;
        Ok(flag)
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Stopping,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Loop ran to its configured end.
    Completed,
    QuitKey,
    Interrupted,
    Failed(String),
}

/// Everything a run may hold, in acquisition order.
#[derive(Default)]
pub struct Resources {
    pub device: Option<Box<dyn DeviceSession>>,
    pub recording: Option<RecordingSession>,
    pub display: Option<Box<dyn DisplaySurface>>,
}

impl Resources {
    pub fn with_device(device: Box<dyn DeviceSession>) -> Self {
        Self {
            device: Some(device),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShutdownSummary {
    pub frames: u64,
    pub reason: StopReason,
    /// One message per resource that failed to release.
    pub release_failures: Vec<String>,
}

pub struct ShutdownController {
    state: ShutdownState,
    interrupt: InterruptFlag,
    reason: Option<StopReason>,
    summary: Option<ShutdownSummary>,
}

impl ShutdownController {
    pub fn new(interrupt: InterruptFlag) -> Self {
        Self {
            state: ShutdownState::Running,
            interrupt,
            reason: None,
            summary: None,
        }
    }

    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// True once a stop was requested or an interrupt arrived.
    pub fn should_stop(&self) -> bool {
        self.state != ShutdownState::Running || self.interrupt.is_set()
    }

    /// Leave `Running`. The first reason sticks.
    pub fn request_stop(&mut self, reason: StopReason) {
        if self.state == ShutdownState::Running {
            log::info!("stop requested: {:?}", reason);
            self.state = ShutdownState::Stopping;
        }
        self.reason.get_or_insert(reason);
    }

    pub fn summary(&self) -> Option<&ShutdownSummary> {
        self.summary.as_ref()
    }

    /// Release `resources` and report. Idempotent once `Stopped`.
    pub fn shutdown(&mut self, resources: &mut Resources, frames: u64) -> ShutdownSummary {
        if let Some(summary) = &self.summary {
            log::debug!("shutdown already completed");
            return summary.clone();
        }
        if self.interrupt.is_set() {
            self.request_stop(StopReason::Interrupted);
        }
        self.request_stop(StopReason::Completed);

        let mut failures = Vec::new();
        if let Some(mut display) = resources.display.take() {
            release("display", display.close(), &mut failures);
        }
        if let Some(mut recording) = resources.recording.take() {
            release("recording", recording.close(), &mut failures);
        }
        if let Some(mut device) = resources.device.take() {
            release("device", device.close(), &mut failures);
        }

        self.state = ShutdownState::Stopped;
        let summary = ShutdownSummary {
            frames,
            reason: self.reason.clone().unwrap_or(StopReason::Completed),
            release_failures: failures,
        };
        log::info!("operation complete: processed {} frames", summary.frames);
        self.summary = Some(summary.clone());
        summary
    }
}

fn release(what: &str, result: Result<()>, failures: &mut Vec<String>) {
    match result {
        Ok(()) => log::debug!("released {what}"),
        Err(err) => {
            log::error!("failed to release {what}: {err}");
            failures.push(format!("{what}: {err}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ScriptedDevice;
    use crate::display::HeadlessDisplay;
    use crate::frame::{ColorFrame, DepthFrame};
    use crate::detect::Detection;
    use crate::device::DeviceInfo;
    use std::sync::atomic::AtomicUsize;

    struct StubbornDevice {
        closes: Arc<AtomicUsize>,
    }

    impl DeviceSession for StubbornDevice {
        fn info(&self) -> DeviceInfo {
            ScriptedDevice::new().info()
        }
        fn try_color(&mut self) -> Result<Option<ColorFrame>> {
            Ok(None)
        }
        fn try_depth(&mut self) -> Result<Option<DepthFrame>> {
            Ok(None)
        }
        fn try_detections(&mut self) -> Result<Option<Vec<Detection>>> {
            Ok(None)
        }
        fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Err(Error::device("usb reset"))
        }
    }

    #[test]
    fn releases_everything_once() {
        let device = ScriptedDevice::new();
        let device_closes = device.close_counter();
        let display = HeadlessDisplay::new();
        let display_closes = display.close_counter();
        let mut resources = Resources::with_device(Box::new(device));
        resources.display = Some(Box::new(display));

        let mut controller = ShutdownController::new(InterruptFlag::new());
        let first = controller.shutdown(&mut resources, 12);
        let second = controller.shutdown(&mut resources, 99);

        assert_eq!(first, second);
        assert_eq!(first.frames, 12);
        assert_eq!(first.reason, StopReason::Completed);
        assert_eq!(controller.state(), ShutdownState::Stopped);
        assert_eq!(device_closes.load(Ordering::SeqCst), 1);
        assert_eq!(display_closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_failure_does_not_stop_the_rest() {
        let closes = Arc::new(AtomicUsize::new(0));
        let display = HeadlessDisplay::new();
        let display_closes = display.close_counter();
        let mut resources = Resources::with_device(Box::new(StubbornDevice {
            closes: Arc::clone(&closes),
        }));
        resources.display = Some(Box::new(display));

        let mut controller = ShutdownController::new(InterruptFlag::new());
        let summary = controller.shutdown(&mut resources, 0);
        assert_eq!(summary.release_failures.len(), 1);
        assert!(summary.release_failures[0].starts_with("device"));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(display_closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn interrupt_is_reported() {
        let interrupt = InterruptFlag::new();
        let mut controller = ShutdownController::new(interrupt.clone());
        assert!(!controller.should_stop());
        interrupt.trigger();
        assert!(controller.should_stop());
        let summary = controller.shutdown(&mut Resources::default(), 3);
        assert_eq!(summary.reason, StopReason::Interrupted);
    }

    #[test]
    fn first_reason_wins() {
        let mut controller = ShutdownController::new(InterruptFlag::new());
        controller.request_stop(StopReason::QuitKey);
        controller.request_stop(StopReason::Failed("late".into()));
        assert_eq!(controller.state(), ShutdownState::Stopping);
        let summary = controller.shutdown(&mut Resources::default(), 0);
        assert_eq!(summary.reason, StopReason::QuitKey);
    }
}
