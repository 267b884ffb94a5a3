//! HTTP client for the upload and analysis endpoints

use super::types::{
    AnalysisRequest, AnalysisResponse, AnalysisResult, ApiError, UploadResponse, UploadedVideo,
};
use crate::config::ApiConfig;
use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::path::Path;

/// Runs an analysis for two uploaded videos
#[async_trait]
pub trait AnalysisEndpoint: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> AppResult<AnalysisResult>;
}

/// Analysis server client
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    live_base_url: String,
    user_id: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            live_base_url: config.live_base_url.trim_end_matches('/').to_string(),
            user_id: config.user_id.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload a coach or player video for offline comparison
    pub async fn upload_video(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        is_coach: bool,
    ) -> AppResult<UploadedVideo> {
        let url = format!("{}/api/upload", self.base_url);
        tracing::info!(
            "Uploading {} video {} ({} bytes)",
            if is_coach { "coach" } else { "player" },
            file_name,
            bytes.len()
        );

        let result = async {
            let form = Form::new()
                .part("video", video_part(file_name, bytes)?)
                .text("userId", self.user_id.clone())
                .text("isCoach", is_coach.to_string());
            self.post_upload(&url, form).await
        }
        .await;

        result.map_err(upload_error)
    }

    /// Upload the reference video for a live session
    pub async fn upload_live_reference(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> AppResult<UploadedVideo> {
        let url = format!("{}/api/live/upload", self.live_base_url);
        tracing::info!("Uploading live reference {} ({} bytes)", file_name, bytes.len());

        let result = async {
            let form = Form::new().part("video", video_part(file_name, bytes)?);
            self.post_upload(&url, form).await
        }
        .await;

        result.map_err(upload_error)
    }

    /// Read a file and upload it with [`ApiClient::upload_video`]
    pub async fn upload_video_file(&self, path: &Path, is_coach: bool) -> AppResult<UploadedVideo> {
        let (name, bytes) = read_video(path).await?;
        self.upload_video(&name, bytes, is_coach).await
    }

    /// Read a file and upload it with [`ApiClient::upload_live_reference`]
    pub async fn upload_live_reference_file(&self, path: &Path) -> AppResult<UploadedVideo> {
        let (name, bytes) = read_video(path).await?;
        self.upload_live_reference(&name, bytes).await
    }

    async fn post_upload(&self, url: &str, form: Form) -> Result<UploadedVideo, ApiError> {
        let response = self.client.post(url).multipart(form).send().await?;
        check_status(response.status())?;

        let body: UploadResponse = response.json().await?;
        let uploaded = body.into_uploaded()?;
        tracing::info!("Uploaded video {} -> {}", uploaded.id, uploaded.url);
        Ok(uploaded)
    }

    async fn post_analysis(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ApiError> {
        let url = format!("{}/api/analyze", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        check_status(response.status())?;

        let body: AnalysisResponse = response.json().await?;
        body.into_result()
    }
}

#[async_trait]
impl AnalysisEndpoint for ApiClient {
    async fn analyze(&self, request: &AnalysisRequest) -> AppResult<AnalysisResult> {
        tracing::info!(
            "Analyzing coach {} against player {}",
            request.coach_video_id,
            request.player_video_id
        );
        self.post_analysis(request).await.map_err(|e| {
            tracing::error!("Analysis error: {}", e);
            AppError::AnalysisFailed(e.to_string())
        })
    }
}

fn check_status(status: StatusCode) -> Result<(), ApiError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ApiError::Status(status.as_u16()))
    }
}

fn upload_error(e: ApiError) -> AppError {
    tracing::error!("Upload error: {}", e);
    AppError::UploadFailed(e.to_string())
}

fn video_part(file_name: &str, bytes: Vec<u8>) -> Result<Part, ApiError> {
    Ok(Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(video_mime(file_name))?)
}

fn video_mime(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match extension.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

async fn read_video(path: &Path) -> AppResult<(String, Vec<u8>)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("video.mp4")
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::UploadFailed(e.to_string()))?;
    Ok((name, bytes))
}
