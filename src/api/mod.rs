//! Analysis server API
//!
//! Video upload (offline comparison and live reference) and the analysis
//! request.

pub mod client;
pub mod types;

pub use client::{AnalysisEndpoint, ApiClient};
pub use types::{
    AnalysisRequest, AnalysisResponse, AnalysisResult, ApiError, Availability, UploadResponse,
    UploadedVideo,
};
