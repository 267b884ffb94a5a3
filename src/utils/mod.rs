//! Shared utilities

pub mod error;
pub mod notice;

pub use error::{AppError, AppResult, ErrorResponse};
pub use notice::Notice;
