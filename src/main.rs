use ffmpeg_next::{self as ffmpeg};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use video2gif::Config;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before tracing so RUST_LOG can live there too
    let dotenv = dotenvy::dotenv();
    init_tracing();
    match dotenv {
        Ok(path) => debug!(?path, "Loaded environment file"),
        Err(error) if error.not_found() => {}
        Err(error) => warn!(%error, "Failed to load .env file"),
    }

    ffmpeg::init()?;

    let config = Config::load()?;
    video2gif::run(config).await
}
