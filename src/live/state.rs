//! Camera state management
//!
//! Defines the capture session state machine and its error reasons.

use crate::utils::AppError;
use serde::{Deserialize, Serialize};

/// Why the camera could not be started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum CameraErrorReason {
    PermissionDenied,
    DeviceNotFound,
    DeviceBusy,
    ConstraintsUnsatisfiable,
    Unknown(String),
}

impl CameraErrorReason {
    /// Fixed user-facing message
    pub fn user_message(&self) -> String {
        match self {
            CameraErrorReason::PermissionDenied => {
                "Camera access denied. Please allow camera permissions.".to_string()
            }
            CameraErrorReason::DeviceNotFound => "No camera found on this device.".to_string(),
            CameraErrorReason::DeviceBusy => {
                "Camera is already in use by another application.".to_string()
            }
            CameraErrorReason::ConstraintsUnsatisfiable => {
                "Camera cannot meet the specified requirements.".to_string()
            }
            CameraErrorReason::Unknown(message) => format!("Camera error: {}", message),
        }
    }
}

impl From<&CameraErrorReason> for AppError {
    fn from(reason: &CameraErrorReason) -> Self {
        let message = reason.user_message();
        match reason {
            CameraErrorReason::PermissionDenied => AppError::PermissionDenied(message),
            CameraErrorReason::DeviceNotFound => AppError::DeviceNotFound(message),
            CameraErrorReason::DeviceBusy => AppError::DeviceBusy(message),
            CameraErrorReason::ConstraintsUnsatisfiable => {
                AppError::ConstraintsUnsatisfiable(message)
            }
            CameraErrorReason::Unknown(_) => AppError::Unknown(message),
        }
    }
}

/// Current state of the capture session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum CameraState {
    /// No camera open
    #[default]
    Idle,
    /// Acquiring the camera
    Starting,
    /// Camera open and frames relaying
    Active,
    /// Acquisition failed
    Error(CameraErrorReason),
}

impl CameraState {
    pub fn is_active(&self) -> bool {
        matches!(self, CameraState::Active)
    }

    /// Whether `next` is a legal transition from this state
    pub fn can_transition_to(&self, next: &CameraState) -> bool {
        use CameraState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Error(_), Starting)
                | (Starting, Active)
                | (Starting, Error(_))
                | (Starting, Idle)
                | (Active, Idle)
                | (Error(_), Idle)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        let idle = CameraState::Idle;
        assert!(idle.can_transition_to(&CameraState::Starting));
        assert!(!idle.can_transition_to(&CameraState::Active));
        assert!(CameraState::Starting.can_transition_to(&CameraState::Active));
        assert!(CameraState::Active.can_transition_to(&CameraState::Idle));
        assert!(!CameraState::Active.can_transition_to(&CameraState::Starting));
        assert!(CameraState::Error(CameraErrorReason::DeviceBusy)
            .can_transition_to(&CameraState::Starting));
    }

    #[test]
    fn test_reason_messages() {
        assert_eq!(
            CameraErrorReason::Unknown("boom".into()).user_message(),
            "Camera error: boom"
        );
        let err = AppError::from(&CameraErrorReason::PermissionDenied);
        assert_eq!(err.code(), "PERMISSION_DENIED");
        assert_eq!(
            err.to_string(),
            "Camera access denied. Please allow camera permissions."
        );
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&CameraState::Error(CameraErrorReason::DeviceBusy)).unwrap();
        assert_eq!(json, r#"{"state":"error","reason":{"kind":"deviceBusy"}}"#);
    }
}
