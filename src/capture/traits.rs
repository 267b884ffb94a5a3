//! Capture trait definitions
//!
//! Platform-agnostic seams between the capture session and a camera
//! implementation.

use super::surface::FrameSlot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// An enumerable camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Unique device ID
    pub id: String,

    /// Human-readable label (may be empty before permission is granted)
    pub label: String,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Constraints for a single acquisition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    /// Exact device to open (None = platform default, user-facing camera)
    pub device_id: Option<String>,

    /// Ideal resolution; backends pick the closest supported format
    pub ideal: Resolution,
}

impl CaptureConstraints {
    pub fn new(device_id: Option<String>, ideal: Resolution) -> Self {
        Self { device_id, ideal }
    }

    /// Same device, lower resolution
    pub fn relaxed(&self, ideal: Resolution) -> Self {
        Self {
            device_id: self.device_id.clone(),
            ideal,
        }
    }

    /// Whether the platform default camera should be used
    pub fn prefers_user_facing(&self) -> bool {
        self.device_id.is_none()
    }
}

/// Raw failure signal from a camera backend.
///
/// Classified into a [`crate::live::CameraErrorReason`] by
/// [`super::device::classify_failure`].
#[derive(Debug, Error)]
pub enum AcquireFailure {
    #[error("{0}")]
    Backend(String),

    #[error(transparent)]
    Os(#[from] std::io::Error),

    #[error("Camera API not supported on this platform")]
    Unsupported,
}

/// A live capture stream owned by exactly one session
pub trait MediaStream: Send {
    /// Number of video tracks carried by the stream
    fn video_track_count(&self) -> usize;

    /// Slot the stream publishes decoded frames into
    fn frame_slot(&self) -> Arc<FrameSlot>;

    /// False once the device was revoked or preempted
    fn is_live(&self) -> bool;

    /// Stop every track and release the device. Must be idempotent.
    fn stop_tracks(&mut self);
}

/// Camera device access (enumeration and acquisition)
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// List available cameras
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, AcquireFailure>;

    /// Open a camera. May prompt for permission.
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn MediaStream>, AcquireFailure>;
}
