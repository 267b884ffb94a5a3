//! Client configuration
//!
//! Loaded once at startup from an optional TOML file; every field has a
//! default so a missing or partial file still yields a usable config.
//! `COACHCAM_SERVER_URL` and `COACHCAM_STREAM_URL` override the endpoints.

use crate::capture::Resolution;
use crate::utils::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub capture: CaptureConfig,
    pub stream: StreamConfig,
}

/// Collaborator HTTP endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the upload/analysis service
    pub base_url: String,

    /// Base URL of the live-analysis service (reference uploads)
    pub live_base_url: String,

    /// User id attached to uploads
    pub user_id: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            live_base_url: "http://localhost:5001".to_string(),
            user_id: "testUserId".to_string(),
        }
    }
}

/// Camera capture and frame relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Resolution requested on the first acquisition attempt
    pub preferred: Resolution,

    /// Resolution requested on the single relaxed retry
    pub relaxed: Resolution,

    /// JPEG quality factor, 1-100
    pub jpeg_quality: u8,

    /// Relay cadence in frames per second (display refresh)
    pub refresh_rate_hz: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            preferred: Resolution {
                width: 640,
                height: 480,
            },
            relaxed: Resolution {
                width: 320,
                height: 240,
            },
            jpeg_quality: 80,
            refresh_rate_hz: 60,
        }
    }
}

impl CaptureConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_rate_hz.max(1) as f64)
    }
}

/// Live streaming channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Websocket URL of the live analysis channel
    pub url: String,

    /// First reconnect delay in milliseconds
    pub reconnect_initial_ms: u64,

    /// Reconnect delay cap in milliseconds
    pub reconnect_max_ms: u64,

    /// How long the channel may stay disconnected while the camera is
    /// active before the session reports degraded mode
    pub degraded_after_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:5001/live".to_string(),
            reconnect_initial_ms: 500,
            reconnect_max_ms: 8_000,
            degraded_after_ms: 10_000,
        }
    }
}

impl StreamConfig {
    pub fn degraded_after(&self) -> Duration {
        Duration::from_millis(self.degraded_after_ms)
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: ClientConfig = toml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;

        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load configuration, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("COACHCAM_SERVER_URL") {
            self.api.base_url = url;
        }
        if let Ok(url) = std::env::var("COACHCAM_STREAM_URL") {
            self.stream.url = url;
        }
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(AppError::Config(format!(
                "jpeg_quality must be within 1-100, got {}",
                self.capture.jpeg_quality
            )));
        }
        if self.capture.refresh_rate_hz == 0 {
            return Err(AppError::Config("refresh_rate_hz must be positive".to_string()));
        }
        if self.stream.reconnect_initial_ms == 0 {
            return Err(AppError::Config(
                "reconnect_initial_ms must be positive".to_string(),
            ));
        }
        if self.stream.reconnect_initial_ms > self.stream.reconnect_max_ms {
            return Err(AppError::Config(
                "reconnect_initial_ms exceeds reconnect_max_ms".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.capture.jpeg_quality, 80);
        assert_eq!(config.capture.preferred.width, 640);
        assert_eq!(config.capture.relaxed.height, 240);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coachcam.toml");
        std::fs::write(
            &path,
            "[stream]\nurl = \"ws://example.test/live\"\n[capture]\njpeg_quality = 70\n",
        )
        .unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.stream.url, "ws://example.test/live");
        assert_eq!(config.stream.reconnect_max_ms, 8_000);
        assert_eq!(config.capture.jpeg_quality, 70);
        assert_eq!(config.api.base_url, "http://localhost:5000");
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[capture]\njpeg_quality = 0\n").unwrap();

        let err = ClientConfig::load(&path).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(ClientConfig::load_or_default(&path).validate().is_ok());
    }

    #[test]
    fn test_reconnect_delays_validated() {
        let mut config = ClientConfig::default();
        config.stream.reconnect_initial_ms = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");

        config.stream.reconnect_initial_ms = 10_000;
        assert!(config.validate().is_err());

        config.stream.reconnect_initial_ms = 250;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("coachcam.toml");

        let mut config = ClientConfig::default();
        config.api.user_id = "player-7".to_string();
        config.save(&path).unwrap();

        let loaded = ClientConfig::load(&path).unwrap();
        assert_eq!(loaded.api.user_id, "player-7");
    }

    #[test]
    fn test_frame_interval() {
        let config = CaptureConfig::default();
        let interval = config.frame_interval();
        assert!(interval > Duration::from_millis(16) && interval < Duration::from_millis(17));
    }
}
