use chrono::{DateTime, Local};

use super::{device_mut, guarded, report_progress, Clock, RunSummary};
use crate::config::{Config, Resolution};
use crate::device::DeviceSession;
use crate::error::{Error, Result};
use crate::frame::{ColorFrame, DepthFrame};
use crate::record::{EncoderFactory, EncoderRole, EncoderTarget, RecordingSession};
use crate::render::{colorize_depth, stamp_timestamp};
use crate::shutdown::{Resources, ShutdownController};
use crate::sync::StreamSynchronizer;
use crate::ui::StageGuard;

/// Record timestamped colour and colourised depth for
/// `camera.recording_time`.
///
/// Encoders open on the first colour frame. Every tick writes the latest
/// colour frame; the depth file gets a frame on ticks where depth has arrived
/// at least once.
pub fn record(
    config: &Config,
    device: Box<dyn DeviceSession>,
    factory: Box<dyn EncoderFactory>,
    clock: &mut dyn Clock,
    controller: &mut ShutdownController,
    progress: Option<&StageGuard>,
) -> Result<RunSummary> {
    let mut resources = Resources::with_device(device);
    guarded(controller, &mut resources, |resources, controller, frames| {
        let targets = vec![
            EncoderTarget::new(EncoderRole::Color, config.output.rgb_path()),
            EncoderTarget::new(EncoderRole::Depth, config.output.depth_path()),
        ];
        resources.recording = Some(RecordingSession::prepare(
            &config.output.base_path,
            targets,
            config.camera.fps,
            factory,
        )?);

        let limit = config.camera.recording_time;
        log::info!(
            "recording for {} seconds to {}",
            limit.as_secs(),
            config.output.base_path.display()
        );
        let mut sync = StreamSynchronizer::new();
        while clock.elapsed() < limit && !controller.should_stop() {
            sync.poll(device_mut(resources)?)?;
            if let Some(color) = sync.color() {
                let recording = resources
                    .recording
                    .as_mut()
                    .ok_or_else(|| Error::device("recording session is not prepared"))?;
                let written = write_tick(config, recording, color, sync.depth(), clock.now_local());
                // a failed depth write still leaves this tick's colour frame in the file
                *frames = recording.frame_count();
                written?;
                report_progress("recorded", *frames, progress);
            }
            clock.tick();
        }

        Ok(resources
            .recording
            .as_ref()
            .filter(|session| session.is_open())
            .map(|session| session.targets().iter().map(|t| t.path.clone()).collect())
            .unwrap_or_default())
    })
}

fn write_tick(
    config: &Config,
    recording: &mut RecordingSession,
    color: &ColorFrame,
    depth: Option<&DepthFrame>,
    now: DateTime<Local>,
) -> Result<()> {
    let (width, height) = color.dimensions();
    recording.ensure_open(width, height)?;

    let mut rgb = color.to_image();
    stamp_timestamp(&mut rgb, now);
    recording.write(EncoderRole::Color, &rgb)?;

    if let Some(depth) = depth {
        let mut colored = colorize_depth(depth, &config.depth, Resolution::new(width, height));
        stamp_timestamp(&mut colored, now);
        recording.write(EncoderRole::Depth, &colored)?;
    }
    Ok(())
}
