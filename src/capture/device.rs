//! Device helpers
//!
//! Selection defaults, display labels, and classification of raw
//! acquisition failures into the camera error taxonomy.

use super::traits::{AcquireFailure, DeviceDescriptor};
use crate::live::CameraErrorReason;
use std::io::ErrorKind;

#[cfg(unix)]
const EBUSY: i32 = 16;

/// Label shown in the device picker
pub fn display_label(device: &DeviceDescriptor) -> String {
    if device.label.trim().is_empty() {
        let short: String = device.id.chars().take(5).collect();
        format!("Camera {}", short)
    } else {
        device.label.clone()
    }
}

/// Device picked when the user has not chosen one
pub fn default_selection(devices: &[DeviceDescriptor]) -> Option<String> {
    devices.first().map(|d| d.id.clone())
}

/// Map a backend failure onto a camera error reason
pub fn classify_failure(failure: &AcquireFailure) -> CameraErrorReason {
    match failure {
        AcquireFailure::Os(err) => classify_os_error(err),
        AcquireFailure::Backend(message) => classify_message(message),
        AcquireFailure::Unsupported => CameraErrorReason::Unknown(failure.to_string()),
    }
}

fn classify_os_error(err: &std::io::Error) -> CameraErrorReason {
    #[cfg(unix)]
    if err.raw_os_error() == Some(EBUSY) {
        return CameraErrorReason::DeviceBusy;
    }

    match err.kind() {
        ErrorKind::PermissionDenied => CameraErrorReason::PermissionDenied,
        ErrorKind::NotFound => CameraErrorReason::DeviceNotFound,
        ErrorKind::AddrInUse | ErrorKind::WouldBlock => CameraErrorReason::DeviceBusy,
        ErrorKind::InvalidInput => CameraErrorReason::ConstraintsUnsatisfiable,
        _ => CameraErrorReason::Unknown(err.to_string()),
    }
}

fn classify_message(message: &str) -> CameraErrorReason {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["permission", "denied", "not authorized", "not allowed"]) {
        CameraErrorReason::PermissionDenied
    } else if has(&["busy", "in use", "already open", "resource temporarily"]) {
        CameraErrorReason::DeviceBusy
    } else if has(&["overconstrained", "constraint", "format", "resolution"]) {
        CameraErrorReason::ConstraintsUnsatisfiable
    } else if has(&["not found", "no such device", "no camera", "out of range"]) {
        CameraErrorReason::DeviceNotFound
    } else {
        CameraErrorReason::Unknown(message.to_string())
    }
}
