//! Live channel wire protocol
//!
//! Every websocket text message is a JSON envelope
//! `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};

/// Accuracy reported when the server omits it
pub const DEFAULT_ACCURACY: f64 = 100.0;

/// Outbound frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMessage {
    /// JPEG data URL
    pub frame: String,

    /// Session context id (the reference video id)
    pub coach_video_id: String,
}

/// Inbound annotated frame and feedback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackMessage {
    /// Annotated image, base64 or data URL
    #[serde(default)]
    pub frame: Option<String>,

    #[serde(default)]
    pub accuracy: Option<f64>,

    #[serde(default)]
    pub tips: Vec<String>,
}

impl FeedbackMessage {
    /// Accuracy in 0-100, defaulting to 100 when absent
    pub fn accuracy_score(&self) -> f64 {
        self.accuracy
            .filter(|a| a.is_finite())
            .unwrap_or(DEFAULT_ACCURACY)
            .clamp(0.0, 100.0)
    }

    /// The image payload, ignoring empty strings
    pub fn image(&self) -> Option<&str> {
        self.frame.as_deref().filter(|f| !f.is_empty())
    }
}

/// Inbound error report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerErrorMessage {
    pub message: String,
}

/// Messages the client sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    LiveFrame(FrameMessage),
}

/// Messages the server sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ProcessedFrame(FeedbackMessage),
    Error(ServerErrorMessage),
}
