pub mod docs;
pub mod middleware;
pub mod routes;

pub use docs::{ApiDoc, api_spec};
pub use middleware::log_request_errors;
pub use routes::{ConversionResponse, VIDEO_FIELD, convert_video_to_gif, health};
