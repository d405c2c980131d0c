use std::time::Duration;

use super::{device_mut, guarded, report_progress, Clock, RunSummary, FIRST_FRAME_POLL_INTERVAL};
use crate::config::Config;
use crate::device::DeviceSession;
use crate::display::{DisplaySurface, QUIT_KEY};
use crate::error::{Error, Result};
use crate::overlay::{annotate, OverlayOptions};
use crate::record::{EncoderFactory, EncoderRole, EncoderTarget, RecordingSession};
use crate::shutdown::{Resources, ShutdownController, StopReason};
use crate::sync::StreamSynchronizer;
use crate::ui::StageGuard;

pub const DETECTION_WINDOW: &str = "Object Detection";

/// Live detection overlay until quit, interrupt or `limit`.
///
/// With `detection.save_video` set, waits up to
/// `detection.first_frame_timeout` for the first colour frame, whose size
/// fixes the size of the annotated recording. Without it the loop starts
/// right away and renders once colour arrives.
pub fn detect(
    config: &Config,
    device: Box<dyn DeviceSession>,
    display: Box<dyn DisplaySurface>,
    factory: Box<dyn EncoderFactory>,
    clock: &mut dyn Clock,
    controller: &mut ShutdownController,
    limit: Option<Duration>,
    progress: Option<&StageGuard>,
) -> Result<RunSummary> {
    let mut resources = Resources::with_device(device);
    resources.display = Some(display);

    guarded(controller, &mut resources, |resources, controller, frames| {
        let mut sync = StreamSynchronizer::new();
        if config.detection.save_video {
            // the first frame fixes the size of the annotated recording
            let first = sync
                .wait_for_first_color(
                    device_mut(resources)?,
                    config.detection.first_frame_timeout,
                    FIRST_FRAME_POLL_INTERVAL,
                    controller,
                )?
                .map(|frame| frame.dimensions());
            let Some((width, height)) = first else {
                return Ok(Vec::new());
            };
            log::info!("first frame received ({width}x{height})");

            let target = EncoderTarget::new(EncoderRole::Annotated, config.output.detection_path());
            let recording = resources.recording.insert(RecordingSession::prepare(
                &config.output.base_path,
                vec![target],
                config.camera.fps,
                factory,
            )?);
            recording.ensure_open(width, height)?;
        }

        let options = OverlayOptions {
            display_info: config.detection.display_info,
        };
        let mut last_count = None;
        loop {
            if controller.should_stop() {
                break;
            }
            if limit.is_some_and(|limit| clock.elapsed() >= limit) {
                break;
            }

            sync.poll(device_mut(resources)?)?;
            if let Some(color) = sync.color() {
                let detections = sync.detections_or_empty();
                if last_count != Some(detections.len()) {
                    log::debug!("{} object(s) in view", detections.len());
                    last_count = Some(detections.len());
                }
                let annotated = annotate(color, detections, &options);
                if let Some(recording) = resources.recording.as_mut() {
                    recording.write(EncoderRole::Annotated, &annotated)?;
                }
                display_mut(resources)?.show(DETECTION_WINDOW, &annotated)?;
                *frames += 1;
                report_progress("processed", *frames, progress);
            }

            if display_mut(resources)?.poll_key() == Some(QUIT_KEY) {
                controller.request_stop(StopReason::QuitKey);
            }
            clock.tick();
        }

        Ok(resources
            .recording
            .as_ref()
            .map(|session| session.targets().iter().map(|t| t.path.clone()).collect())
            .unwrap_or_default())
    })
}

pub(super) fn display_mut(resources: &mut Resources) -> Result<&mut dyn DisplaySurface> {
    match resources.display.as_mut() {
        Some(display) => Ok(display.as_mut()),
        None => Err(Error::Display("display surface is not open".to_string())),
    }
}
