//! Live analysis
//!
//! Camera state machine, the capture session that relays frames to the
//! analysis service, and the feedback it renders.

pub mod feedback;
pub mod scheduler;
pub mod session;
pub mod state;

pub use feedback::{LiveFeedback, LiveView, RelayStats, RenderFrame};
pub use scheduler::{CountedScheduler, FrameScheduler, IntervalScheduler};
pub use session::{CaptureSession, SessionError, SessionEvent, SessionSettings};
pub use state::{CameraErrorReason, CameraState};
