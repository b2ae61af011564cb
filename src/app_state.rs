use crate::config::Config;
use crate::convert::{FfmpegGifConverter, GifConverter, GifOptions};
use crate::host::{ImageHost, ImgbbClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const BYTES_PER_MB: usize = 1024 * 1024;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<dyn GifConverter>,
    pub host: Arc<dyn ImageHost>,
    pub gif_options: GifOptions,
    pub max_upload_mb: u64,
}

impl AppState {
    pub fn new(
        converter: Arc<dyn GifConverter>,
        host: Arc<dyn ImageHost>,
        gif_options: GifOptions,
        max_upload_mb: u64,
    ) -> Self {
        Self {
            converter,
            host,
            gif_options,
            max_upload_mb,
        }
    }

    /// Wire the libav converter and the ImgBB client from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut converter = FfmpegGifConverter::new(config.convert_timeout());
        if let Some(workspace) = &config.workspace {
            let workspace = PathBuf::from(workspace);
            std::fs::create_dir_all(&workspace)?;
            info!(?workspace, "Using workspace for intermediate files");
            converter = converter.with_temp_dir(workspace);
        }

        let api_key = config
            .imgbb_api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("ImgBB API key is not configured"))?;
        let host = ImgbbClient::new(
            api_key,
            config.imgbb_upload_url.clone(),
            config.upload_timeout(),
        )?;
        info!(upload_url = host.upload_url(), "ImgBB client ready");

        Ok(Self::new(
            Arc::new(converter),
            Arc::new(host),
            config.gif_options(),
            config.max_upload_mb,
        ))
    }

    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.max_upload_mb)
            .unwrap_or(usize::MAX)
            .saturating_mul(BYTES_PER_MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::MockGifConverter;
    use crate::host::MockImageHost;

    #[test]
    fn test_max_upload_bytes() {
        let state = AppState::new(
            Arc::new(MockGifConverter::new()),
            Arc::new(MockImageHost::new()),
            GifOptions::default(),
            20,
        );
        assert_eq!(state.max_upload_bytes(), 20 * 1024 * 1024);
    }

    #[test]
    fn test_from_config_requires_key() {
        assert!(AppState::from_config(&Config::default()).is_err());

        let config = Config {
            imgbb_api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.max_upload_mb, 20);
        assert_eq!(state.gif_options, GifOptions::default());
    }
}
