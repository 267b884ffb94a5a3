//! Synchronized playback
//!
//! A driver media element (the coach video) with follower elements that
//! track it: the player recording and the server comparison video.

pub mod analysis;
pub mod media;
pub mod probe;
pub mod synchronizer;
pub mod types;

pub use analysis::{run_analysis, AnalysisStatus, AnalysisTracker};
pub use media::{ClockedMedia, MediaElement, MediaEvent};
pub use probe::{probe_media, MediaMetadata};
pub use synchronizer::{Follower, PlaybackSynchronizer, SKIP_SECONDS};
pub use types::{format_time, Overlay, OverlayState, PlaybackError, TrackRole};
