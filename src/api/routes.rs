use crate::convert::{UploadedVideo, VideoFormat};
use crate::{AppState, Error};
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Extension, Multipart};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

/// Multipart field carrying the video.
pub const VIDEO_FIELD: &str = "video";

/// Multipart upload accepted by the conversion endpoint, for the OpenAPI
/// document; the handler reads the form field by field.
#[derive(ToSchema)]
pub struct ConversionRequest {
    /// Video file: mp4, avi, mov or webm.
    #[schema(value_type = String, format = Binary)]
    pub video: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversionResponse {
    pub success: bool,
    /// Public URL of the hosted GIF.
    pub gif_url: String,
}

/// Convert an uploaded video to a GIF and host it.
#[utoipa::path(
    post,
    path = "/convert-to-gif",
    tag = "conversion",
    request_body(content = ConversionRequest, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "GIF created and hosted", body = ConversionResponse),
        (status = 400, description = "Missing or invalid video file", body = crate::ErrorResponse),
        (status = 500, description = "Conversion or upload failed", body = crate::ErrorResponse),
    )
)]
pub async fn convert_video_to_gif(
    Extension(state): Extension<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConversionResponse>, Error> {
    let mut multipart =
        multipart.map_err(|rejection| Error::InvalidMultipart(rejection.body_text()))?;
    let video = read_video(&mut multipart, state.max_upload_mb, state.max_upload_bytes()).await?;

    info!(
        file_name = ?video.file_name,
        format = ?video.format,
        size = video.len(),
        "Converting video to GIF"
    );

    let gif = state
        .converter
        .convert(&video, &state.gif_options)
        .await
        .map_err(Error::into_conversion)
        .inspect_err(|error| error!(%error, "Video to GIF conversion failed"))?;

    let gif_name = video.gif_file_name();
    let gif_url = state
        .host
        .upload(&gif_name, gif)
        .await
        .map_err(Error::into_upload)
        .inspect_err(|error| error!(%error, "GIF upload failed"))?;

    if gif_url.is_empty() {
        return Err(Error::Upload("image host returned an empty URL".into()));
    }

    info!(%gif_url, "GIF hosted");
    Ok(Json(ConversionResponse {
        success: true,
        gif_url,
    }))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Pull the `video` field out of the form, skipping any other fields.
async fn read_video(
    multipart: &mut Multipart,
    max_upload_mb: u64,
    max_upload_bytes: usize,
) -> Result<UploadedVideo, Error> {
    let multipart_error = |error: MultipartError| {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Error::TooLarge {
                limit_mb: max_upload_mb,
            }
        } else {
            Error::InvalidMultipart(error.body_text())
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(VIDEO_FIELD) {
            debug!(field = ?field.name(), "Ignoring extra form field");
            continue;
        }

        let (file_name, content_type, format) = describe_field(&field)?;
        let data = field.bytes().await.map_err(multipart_error)?;

        if data.is_empty() {
            return Err(Error::EmptyVideo);
        }
        if data.len() > max_upload_bytes {
            warn!(size = data.len(), max_upload_bytes, "Video exceeds upload limit");
            return Err(Error::TooLarge {
                limit_mb: max_upload_mb,
            });
        }

        return Ok(UploadedVideo {
            file_name,
            content_type,
            format,
            data,
        });
    }

    Err(Error::MissingVideo)
}

/// File name, content type and container of the field.
///
/// A named file must carry an accepted extension; an unnamed one falls back
/// to its content type and is otherwise left for the converter to probe.
fn describe_field(
    field: &Field<'_>,
) -> Result<(Option<String>, Option<String>, Option<VideoFormat>), Error> {
    let file_name = field
        .file_name()
        .filter(|name| !name.is_empty())
        .map(str::to_owned);
    let content_type = field.content_type().map(str::to_owned);

    let format = match &file_name {
        Some(name) => Some(VideoFormat::from_file_name(name).ok_or(Error::UnsupportedFormat)?),
        None => content_type.as_deref().and_then(VideoFormat::from_mime),
    };

    Ok((file_name, content_type, format))
}
