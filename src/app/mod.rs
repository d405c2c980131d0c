//! Mode runners.
//!
//! Each runner takes ownership of an opened device (and display, where it
//! shows anything), drives the single-threaded poll/render/write loop and
//! always ends in the [`ShutdownController`], also when the loop fails.
//!
//! - `record`: colour + colourised depth to two video files for a fixed time
//! - `detect`: live detection overlay, optionally saved to a video file
//! - `show_video`: live colour and depth preview
//! - `check_connection`: report what the device says about itself

mod check_connection;
mod clock;
mod detect;
mod record;
mod show_video;

pub use check_connection::check_connection;
pub use clock::{Clock, RealtimeClock, SimulatedClock};
pub use detect::{detect, DETECTION_WINDOW};
pub use record::record;
pub use show_video::{show_video, DEPTH_WINDOW, RGB_WINDOW};

use std::path::PathBuf;
use std::time::Duration;

use crate::device::DeviceSession;
use crate::error::{Error, Result};
use crate::shutdown::{Resources, ShutdownController, StopReason};
use crate::ui::StageGuard;

/// Sleep between polls while waiting for the first colour frame.
pub const FIRST_FRAME_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Progress is logged every this many frames.
pub const PROGRESS_EVERY: u64 = 30;

/// Outcome of a finished run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub reason: StopReason,
    /// Video files that were opened during the run.
    pub outputs: Vec<PathBuf>,
    pub release_failures: Vec<String>,
}

/// Run `body` against `resources`, then shut down however it ended. Errors
/// from `body` are returned only after every resource has been released.
fn guarded<F>(controller: &mut ShutdownController, resources: &mut Resources, body: F) -> Result<RunSummary>
where
    F: FnOnce(&mut Resources, &mut ShutdownController, &mut u64) -> Result<Vec<PathBuf>>,
{
    let mut frames = 0;
    let outcome = body(resources, controller, &mut frames);
    if let Err(err) = &outcome {
        log::error!("run failed: {err}");
        controller.request_stop(StopReason::Failed(err.to_string()));
    }
    let summary = controller.shutdown(resources, frames);
    outcome.map(|outputs| RunSummary {
        frames: summary.frames,
        reason: summary.reason,
        outputs,
        release_failures: summary.release_failures,
    })
}

fn device_mut(resources: &mut Resources) -> Result<&mut dyn DeviceSession> {
    match resources.device.as_mut() {
        Some(device) => Ok(device.as_mut()),
        None => Err(Error::device("device session is not open")),
    }
}

fn report_progress(verb: &str, frames: u64, progress: Option<&StageGuard>) {
    if frames > 0 && frames % PROGRESS_EVERY == 0 {
        log::info!("{verb} {frames} frames");
        if let Some(stage) = progress {
            stage.set_message(format!("{verb} {frames} frames"));
        }
    }
}
