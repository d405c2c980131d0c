use crate::device::{DeviceInfo, DeviceSession};
use crate::error::Result;

/// Read the device description and release the device again.
pub fn check_connection(mut device: Box<dyn DeviceSession>) -> Result<DeviceInfo> {
    let info = device.info();
    log::info!(
        "connected to {} (usb {}, {} camera(s), {} stereo pair(s))",
        info.name,
        info.usb_speed,
        info.connected_cameras.len(),
        info.stereo_pairs.len()
    );
    if let Err(err) = device.close() {
        log::warn!("failed to close device after connection check: {err}");
    }
    Ok(info)
}
