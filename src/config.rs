use crate::convert::{
    DEFAULT_GIF_FPS, DEFAULT_GIF_HEIGHT, DEFAULT_GIF_MAX_DURATION_SECS, DEFAULT_GIF_WIDTH,
    GifOptions,
};
use crate::host::imgbb::DEFAULT_UPLOAD_URL;
use anyhow::{Result, bail};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Service configuration, loaded from CLI, environment, and an optional
/// config file.
///
/// Example configuration file content
/// # video2gif configuration
///
/// # Server configuration
/// listen_on_port = 5000
/// bind_address = "0.0.0.0"
/// max_upload_mb = 20
///
/// # ImgBB configuration (the key is usually set through IMGBB_API_KEY)
/// imgbb_api_key = "0123456789abcdef"
/// imgbb_upload_url = "https://api.imgbb.com/1/upload"
/// upload_timeout_secs = 60
///
/// # GIF output
/// gif_width = 320
/// gif_height = 240
/// gif_fps = 10
/// gif_max_duration_secs = 5
/// convert_timeout_secs = 120
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[serde(default)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    #[serde(default = "default_port")]
    pub listen_on_port: u16,

    /// Address to bind
    #[arg(short, long, default_value = "0.0.0.0")]
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Configuration file path
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// ImgBB API key
    #[arg(long, env = "IMGBB_API_KEY", hide_env_values = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imgbb_api_key: Option<String>,

    /// ImgBB upload endpoint
    #[arg(long, env = "IMGBB_UPLOAD_URL", default_value = DEFAULT_UPLOAD_URL)]
    #[serde(default = "default_upload_url")]
    pub imgbb_upload_url: String,

    /// Largest accepted video upload, in megabytes
    #[arg(short, long, default_value_t = 20)]
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,

    /// Width of the generated GIF
    #[arg(long, default_value_t = DEFAULT_GIF_WIDTH)]
    #[serde(default = "default_gif_width")]
    pub gif_width: u32,

    /// Height of the generated GIF
    #[arg(long, default_value_t = DEFAULT_GIF_HEIGHT)]
    #[serde(default = "default_gif_height")]
    pub gif_height: u32,

    /// Frames per second of the generated GIF
    #[arg(long, default_value_t = DEFAULT_GIF_FPS)]
    #[serde(default = "default_gif_fps")]
    pub gif_fps: u32,

    /// Seconds of video converted, counted from the start
    #[arg(long, default_value_t = DEFAULT_GIF_MAX_DURATION_SECS)]
    #[serde(default = "default_gif_max_duration_secs")]
    pub gif_max_duration_secs: u64,

    /// Conversion time limit in seconds
    #[arg(long, default_value_t = 120)]
    #[serde(default = "default_convert_timeout_secs")]
    pub convert_timeout_secs: u64,

    /// ImgBB request time limit in seconds
    #[arg(long, default_value_t = 60)]
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,

    /// Directory for intermediate files (system temp dir when unset)
    #[arg(short = 'w', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_on_port: default_port(),
            bind_address: default_bind_address(),
            config: None,
            imgbb_api_key: None,
            imgbb_upload_url: default_upload_url(),
            max_upload_mb: default_max_upload_mb(),
            gif_width: default_gif_width(),
            gif_height: default_gif_height(),
            gif_fps: default_gif_fps(),
            gif_max_duration_secs: default_gif_max_duration_secs(),
            convert_timeout_secs: default_convert_timeout_secs(),
            upload_timeout_secs: default_upload_timeout_secs(),
            workspace: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> Result<Self> {
        Self::from_args(Config::parse())
    }

    fn from_args(mut config: Config) -> Result<Self> {
        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // A CLI value still at its default yields to the file value
        if self.listen_on_port == default_port() {
            self.listen_on_port = file_config.listen_on_port;
        }
        if self.bind_address == default_bind_address() {
            self.bind_address = file_config.bind_address;
        }
        if self.imgbb_upload_url == default_upload_url() {
            self.imgbb_upload_url = file_config.imgbb_upload_url;
        }
        if self.max_upload_mb == default_max_upload_mb() {
            self.max_upload_mb = file_config.max_upload_mb;
        }
        if self.gif_width == default_gif_width() {
            self.gif_width = file_config.gif_width;
        }
        if self.gif_height == default_gif_height() {
            self.gif_height = file_config.gif_height;
        }
        if self.gif_fps == default_gif_fps() {
            self.gif_fps = file_config.gif_fps;
        }
        if self.gif_max_duration_secs == default_gif_max_duration_secs() {
            self.gif_max_duration_secs = file_config.gif_max_duration_secs;
        }
        if self.convert_timeout_secs == default_convert_timeout_secs() {
            self.convert_timeout_secs = file_config.convert_timeout_secs;
        }
        if self.upload_timeout_secs == default_upload_timeout_secs() {
            self.upload_timeout_secs = file_config.upload_timeout_secs;
        }

        // For Option fields, CLI takes precedence if Some
        if self.imgbb_api_key.is_none() {
            self.imgbb_api_key = file_config.imgbb_api_key;
        }
        if self.workspace.is_none() {
            self.workspace = file_config.workspace;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self
            .imgbb_api_key
            .as_ref()
            .map(|key| key.trim().is_empty())
            .unwrap_or(true)
        {
            bail!("ImgBB API key is required (set IMGBB_API_KEY or --imgbb-api-key)");
        }

        if !self.imgbb_upload_url.starts_with("http://")
            && !self.imgbb_upload_url.starts_with("https://")
        {
            bail!("ImgBB upload URL must start with http:// or https://");
        }

        if self.max_upload_mb == 0 {
            bail!("max_upload_mb must be greater than 0");
        }
        if self.gif_width == 0 || self.gif_height == 0 {
            bail!(
                "GIF dimensions must be non-zero, got {}x{}",
                self.gif_width,
                self.gif_height
            );
        }
        if self.gif_fps == 0 || self.gif_fps > 100 {
            bail!("gif_fps must be between 1 and 100, got {}", self.gif_fps);
        }
        if self.gif_max_duration_secs == 0 {
            bail!("gif_max_duration_secs must be greater than 0");
        }
        if self.convert_timeout_secs == 0 || self.upload_timeout_secs == 0 {
            bail!("timeouts must be greater than 0");
        }

        Ok(())
    }

    pub fn gif_options(&self) -> GifOptions {
        GifOptions {
            width: self.gif_width,
            height: self.gif_height,
            fps: self.gif_fps,
            max_duration: Duration::from_secs(self.gif_max_duration_secs),
        }
    }

    pub fn convert_timeout(&self) -> Duration {
        Duration::from_secs(self.convert_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

// Default value functions
fn default_port() -> u16 {
    5000
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_upload_url() -> String {
    DEFAULT_UPLOAD_URL.to_string()
}

fn default_max_upload_mb() -> u64 {
    20
}

fn default_gif_width() -> u32 {
    DEFAULT_GIF_WIDTH
}

fn default_gif_height() -> u32 {
    DEFAULT_GIF_HEIGHT
}

fn default_gif_fps() -> u32 {
    DEFAULT_GIF_FPS
}

fn default_gif_max_duration_secs() -> u64 {
    DEFAULT_GIF_MAX_DURATION_SECS
}

fn default_convert_timeout_secs() -> u64 {
    120
}

fn default_upload_timeout_secs() -> u64 {
    60
}
