//! Camera capture
//!
//! Device access traits, device helpers, the frame surface shared with
//! capture streams, and the JPEG encoder used by the frame relay.

pub mod device;
pub mod encoder;
pub mod surface;
pub mod traits;

#[cfg(feature = "native-camera")]
pub mod webcam;

pub use surface::{CaptureSurface, FrameSlot, RawFrame};
pub use traits::{
    AcquireFailure, CameraBackend, CaptureConstraints, DeviceDescriptor, MediaStream, Resolution,
};

#[cfg(feature = "native-camera")]
pub use webcam::WebcamBackend;
