use std::time::Duration;

use super::detect::display_mut;
use super::{device_mut, guarded, report_progress, Clock, RunSummary};
use crate::config::{Config, Resolution};
use crate::device::DeviceSession;
use crate::display::{DisplaySurface, QUIT_KEY};
use crate::error::Result;
use crate::render::colorize_depth;
use crate::shutdown::{Resources, ShutdownController, StopReason};
use crate::sync::StreamSynchronizer;
use crate::ui::StageGuard;

pub const RGB_WINDOW: &str = "RGB";
pub const DEPTH_WINDOW: &str = "Depth";

/// Live colour and depth preview until quit, interrupt or `limit`. Nothing is
/// written to disk.
pub fn show_video(
    config: &Config,
    device: Box<dyn DeviceSession>,
    display: Box<dyn DisplaySurface>,
    clock: &mut dyn Clock,
    controller: &mut ShutdownController,
    limit: Option<Duration>,
    progress: Option<&StageGuard>,
) -> Result<RunSummary> {
    let mut resources = Resources::with_device(device);
    resources.display = Some(display);

    guarded(controller, &mut resources, |resources, controller, frames| {
        let mut sync = StreamSynchronizer::new();
        loop {
            if controller.should_stop() {
                break;
            }
            if limit.is_some_and(|limit| clock.elapsed() >= limit) {
                break;
            }

            sync.poll(device_mut(resources)?)?;
            if let Some(color) = sync.color() {
                let display = display_mut(resources)?;
                display.show(RGB_WINDOW, color.image())?;
                if let Some(depth) = sync.depth() {
                    let (width, height) = color.dimensions();
                    let colored = colorize_depth(depth, &config.depth, Resolution::new(width, height));
                    display.show(DEPTH_WINDOW, &colored)?;
                }
                *frames += 1;
                report_progress("shown", *frames, progress);
            }

            if display_mut(resources)?.poll_key() == Some(QUIT_KEY) {
                controller.request_stop(StopReason::QuitKey);
            }
            clock.tick();
        }
        Ok(Vec::new())
    })
}
