use super::routes::{ConversionRequest, ConversionResponse};
use crate::ErrorResponse;
use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Video to GIF Converter API",
        version = "1.0.0",
        description = "API for converting videos to GIFs and uploading them to ImgBB"
    ),
    paths(super::routes::convert_video_to_gif),
    components(schemas(ConversionRequest, ConversionResponse, ErrorResponse)),
    tags(
        (name = "conversion", description = "Video to GIF conversion")
    )
)]
pub struct ApiDoc;

pub async fn api_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
