pub mod api;
pub mod app_state;
pub mod config;
pub mod convert;
pub mod error;
pub mod host;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Extension};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

//
// Re-export
//
pub use api::{ApiDoc, ConversionResponse, VIDEO_FIELD, convert_video_to_gif};
pub use app_state::AppState;
pub use config::Config;
pub use convert::{
    FfmpegGifConverter, GifConverter, GifOptions, MockGifConverter, UploadedVideo, VideoFormat,
};
pub use error::{Error, ErrorResponse, Result};
pub use host::{ImageHost, ImgbbClient, MockImageHost};

/// Room for multipart boundaries and headers on top of the video itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.max_upload_bytes().saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/convert-to-gif", post(convert_video_to_gif))
        .route("/convert-video-to-gif", post(convert_video_to_gif))
        .route("/apispec.json", get(api::api_spec))
        .route("/health", get(api::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(api::log_request_errors))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}

/// Serve on an already bound listener until the server stops.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    info!(
        max_upload_mb = state.max_upload_mb,
        gif = ?state.gif_options,
        "Video to GIF service configured"
    );

    let addr = format!("{}:{}", config.bind_address, config.listen_on_port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|error| anyhow::anyhow!("Failed to bind {addr}: {error}"))?;
    info!("Listening on http://{addr}");

    serve(listener, state).await
}
