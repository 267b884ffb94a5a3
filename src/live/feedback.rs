//! Feedback and render state exposed to the view

use crate::capture::encoder::decode_image_payload;
use crate::stream::protocol::{FeedbackMessage, DEFAULT_ACCURACY};
use crate::utils::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest feedback overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveFeedback {
    pub accuracy: f64,
    pub tips: Vec<String>,
}

impl Default for LiveFeedback {
    fn default() -> Self {
        Self {
            accuracy: DEFAULT_ACCURACY,
            tips: Vec::new(),
        }
    }
}

impl LiveFeedback {
    pub fn from_message(message: &FeedbackMessage) -> Self {
        Self {
            accuracy: message.accuracy_score(),
            tips: message.tips.clone(),
        }
    }

    pub fn accuracy_label(&self) -> String {
        format!("Accuracy: {:.2}%", self.accuracy)
    }
}

/// Annotated frame received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFrame {
    /// Image as sent by the server (base64 or data URL)
    pub image: String,
    pub received_at: DateTime<Utc>,
}

impl RenderFrame {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            received_at: Utc::now(),
        }
    }

    /// Decoded image bytes for renderers
    pub fn bytes(&self) -> AppResult<Vec<u8>> {
        decode_image_payload(&self.image)
    }
}

/// What the preview area should show
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiveView<'a> {
    /// Camera is not active
    CameraOff,
    /// Raw local camera surface
    Raw,
    /// Server-annotated frame
    Annotated(&'a RenderFrame),
}

/// Frame relay counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    /// Frames handed to the channel
    pub frames_sent: u64,
    /// Frames shed (channel busy/disconnected or encode failure)
    pub frames_dropped: u64,
    /// Cycles skipped because no frame was decoded yet
    pub cycles_skipped: u64,
    /// Feedback messages received
    pub feedback_received: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_label() {
        let feedback = LiveFeedback {
            accuracy: 87.5,
            tips: vec![],
        };
        assert_eq!(feedback.accuracy_label(), "Accuracy: 87.50%");
        assert_eq!(LiveFeedback::default().accuracy_label(), "Accuracy: 100.00%");
    }

    #[test]
    fn test_render_frame_bytes() {
        let frame = RenderFrame::new("data:image/jpeg;base64,AQID");
        assert_eq!(frame.bytes().unwrap(), vec![1, 2, 3]);
    }
}
