//! Dismissible user-facing notices

use super::error::AppError;
use serde::{Deserialize, Serialize};

/// A dismissible notice rendered by the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    /// Error code (see [`AppError::code`])
    pub code: String,

    /// Message shown to the user
    pub message: String,

    /// Optional actionable hint
    pub guidance: Option<String>,

    /// Whether the user dismissed it
    pub dismissed: bool,
}

impl Notice {
    pub fn dismiss(&mut self) {
        self.dismissed = true;
    }

    pub fn is_visible(&self) -> bool {
        !self.dismissed
    }
}

impl From<&AppError> for Notice {
    fn from(error: &AppError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            guidance: error.guidance().map(str::to_string),
            dismissed: false,
        }
    }
}

impl From<AppError> for Notice {
    fn from(error: AppError) -> Self {
        Notice::from(&error)
    }
}
