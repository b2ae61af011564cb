//! Error type shared by the handler and both delegated capabilities.
//!
//! Every variant maps to either a client error (400) or a processing
//! error (500), and renders as an [`ErrorResponse`] body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No video file provided")]
    MissingVideo,

    #[error("Video file is empty")]
    EmptyVideo,

    #[error("Invalid multipart request: {0}")]
    InvalidMultipart(String),

    #[error("Invalid file format. Supported formats: mp4, avi, mov, webm")]
    UnsupportedFormat,

    #[error("File size exceeds {limit_mb}MB limit")]
    TooLarge { limit_mb: u64 },

    #[error("Failed to convert video to GIF: {0}")]
    Conversion(String),

    #[error("Failed to upload GIF: {0}")]
    Upload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingVideo
            | Error::EmptyVideo
            | Error::InvalidMultipart(_)
            | Error::UnsupportedFormat
            | Error::TooLarge { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Fold any failure raised while converting into [`Error::Conversion`].
    pub fn into_conversion(self) -> Self {
        match self {
            Error::Conversion(_) => self,
            other => Error::Conversion(other.to_string()),
        }
    }

    /// Fold any failure raised while uploading into [`Error::Upload`].
    pub fn into_upload(self) -> Self {
        match self {
            Error::Upload(_) => self,
            other => Error::Upload(other.to_string()),
        }
    }
}

/// Body of every 400 and 500 response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    pub error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
