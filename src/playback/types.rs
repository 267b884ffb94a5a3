//! Playback types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    #[error("Video metadata has not loaded yet")]
    MetadataNotLoaded,

    #[error("Media element '{0}' is already driven by another synchronizer")]
    ElementAlreadyDriven(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Unknown overlay: {0}")]
    UnknownOverlay(String),
}

/// What a media element shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackRole {
    /// Reference video, normally the driver
    Coach,
    /// The player's recording
    Player,
    /// Server-rendered comparison video
    Comparison,
}

impl TrackRole {
    /// Notice shown when the element fails to load
    pub fn load_error_message(&self) -> &'static str {
        match self {
            TrackRole::Coach => "Error loading coach video.",
            TrackRole::Player => "Error loading player video.",
            TrackRole::Comparison => {
                "Error loading comparison video. Please try analyzing again."
            }
        }
    }
}

/// Rendering overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overlay {
    Grid,
    Skeleton,
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Overlay::Grid => write!(f, "grid"),
            Overlay::Skeleton => write!(f, "skeleton"),
        }
    }
}

impl FromStr for Overlay {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grid" => Ok(Overlay::Grid),
            "skeleton" => Ok(Overlay::Skeleton),
            other => Err(PlaybackError::UnknownOverlay(other.to_string())),
        }
    }
}

/// Overlay flags. The skeleton view starts shown, the grid hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayState {
    pub grid: bool,
    pub skeleton: bool,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            grid: false,
            skeleton: true,
        }
    }
}

impl OverlayState {
    pub fn is_enabled(&self, overlay: Overlay) -> bool {
        match overlay {
            Overlay::Grid => self.grid,
            Overlay::Skeleton => self.skeleton,
        }
    }

    /// Flip one flag and return its new value
    pub fn toggle(&mut self, overlay: Overlay) -> bool {
        let flag = match overlay {
            Overlay::Grid => &mut self.grid,
            Overlay::Skeleton => &mut self.skeleton,
        };
        *flag = !*flag;
        *flag
    }
}

/// Format seconds as `m:ss`
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
