//! Request and response types for the analysis server

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport-level API errors. Callers wrap these into
/// `AppError::UploadFailed` / `AppError::AnalysisFailed`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Raw upload response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    pub video_url: Option<String>,
    pub video_id: Option<String>,
    pub message: Option<String>,
}

/// A video stored on the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedVideo {
    /// Playable media URL
    pub url: String,
    /// Opaque id used as the session context
    pub id: String,
}

impl UploadResponse {
    pub fn into_uploaded(self) -> Result<UploadedVideo, ApiError> {
        if !self.success {
            return Err(ApiError::Rejected(
                self.message.unwrap_or_else(|| "Upload failed".to_string()),
            ));
        }
        match (self.video_url, self.video_id) {
            (Some(url), Some(id)) => Ok(UploadedVideo { url, id }),
            _ => Err(ApiError::Rejected(
                "Response is missing videoUrl or videoId".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub coach_video_id: String,
    pub player_video_id: String,
}

/// Raw analysis response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub technique: f64,
    #[serde(default)]
    pub performance: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub normal_video_url: Option<String>,
    pub dynamic_video_url: Option<String>,
    pub csv_url: Option<String>,
    pub plot_urls: Option<Vec<String>>,
}

/// An optional report artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum Availability<T> {
    Available(T),
    NotAvailable,
}

impl<T> Availability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available(_))
    }

    pub fn as_ref(&self) -> Availability<&T> {
        match self {
            Availability::Available(value) => Availability::Available(value),
            Availability::NotAvailable => Availability::NotAvailable,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Availability::Available(value) => Some(value),
            Availability::NotAvailable => None,
        }
    }
}

impl From<Option<String>> for Availability<String> {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(url) if !url.trim().is_empty() => Availability::Available(url),
            _ => Availability::NotAvailable,
        }
    }
}

impl From<Option<Vec<String>>> for Availability<Vec<String>> {
    fn from(value: Option<Vec<String>>) -> Self {
        match value {
            Some(urls) if !urls.is_empty() => Availability::Available(urls),
            _ => Availability::NotAvailable,
        }
    }
}

/// Analysis report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub accuracy: f64,
    pub technique: f64,
    pub performance: f64,
    pub suggestions: Vec<String>,
    pub normal_video: Availability<String>,
    pub dynamic_video: Availability<String>,
    pub csv: Availability<String>,
    pub plots: Availability<Vec<String>>,
}

impl AnalysisResponse {
    pub fn into_result(self) -> Result<AnalysisResult, ApiError> {
        if !self.success {
            return Err(ApiError::Rejected(
                self.message.unwrap_or_else(|| "Analysis failed".to_string()),
            ));
        }
        Ok(AnalysisResult {
            accuracy: self.accuracy,
            technique: self.technique,
            performance: self.performance,
            suggestions: self.suggestions,
            normal_video: self.normal_video_url.into(),
            dynamic_video: self.dynamic_video_url.into(),
            csv: self.csv_url.into(),
            plots: self.plot_urls.into(),
        })
    }
}
