//! Video to animated GIF conversion.
//!
//! The handler only sees [`GifConverter`]; production wires in
//! [`FfmpegGifConverter`], tests use [`MockGifConverter`].

pub mod ffmpeg;
pub mod mock;

pub use ffmpeg::FfmpegGifConverter;
pub use mock::MockGifConverter;

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_GIF_WIDTH: u32 = 320;
pub const DEFAULT_GIF_HEIGHT: u32 = 240;
pub const DEFAULT_GIF_FPS: u32 = 10;
pub const DEFAULT_GIF_MAX_DURATION_SECS: u64 = 5;

/// Containers accepted by the upload endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VideoFormat {
    Mp4,
    Avi,
    Mov,
    Webm,
}

impl VideoFormat {
    pub const ALL: [VideoFormat; 4] = [
        VideoFormat::Mp4,
        VideoFormat::Avi,
        VideoFormat::Mov,
        VideoFormat::Webm,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Avi => "avi",
            VideoFormat::Mov => "mov",
            VideoFormat::Webm => "webm",
        }
    }

    /// Case-insensitive match on the file name extension.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name).extension()?.to_str()?;
        Self::from_extension(extension)
    }

    fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| extension.eq_ignore_ascii_case(format.extension()))
    }

    /// Resolve a content type through the extensions `mime_guess` knows for it.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
        mime_guess::get_mime_extensions_str(&essence)?
            .iter()
            .find_map(|extension| Self::from_extension(extension))
    }
}

/// A video received from a client, alive for one request.
#[derive(Clone, Debug)]
pub struct UploadedVideo {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub format: Option<VideoFormat>,
    pub data: Bytes,
}

impl UploadedVideo {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            file_name: None,
            content_type: None,
            format: None,
            data: data.into(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        self.format = VideoFormat::from_file_name(&file_name).or(self.format);
        self.file_name = Some(file_name);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Name used for the hosted GIF: the upload's stem with a `.gif` extension.
    pub fn gif_file_name(&self) -> String {
        let stem = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).file_stem())
            .and_then(|stem| stem.to_str())
            .map(|stem| {
                stem.chars()
                    .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
                    .collect::<String>()
            })
            .filter(|stem| !stem.is_empty());

        format!("{}.gif", stem.as_deref().unwrap_or("file"))
    }
}

/// Output geometry and timing of the generated GIF.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GifOptions {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub max_duration: Duration,
}

impl GifOptions {
    /// Upper bound on the number of frames written.
    pub fn max_frames(&self) -> i64 {
        i64::from(self.fps) * self.max_duration.as_secs() as i64
    }
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_GIF_WIDTH,
            height: DEFAULT_GIF_HEIGHT,
            fps: DEFAULT_GIF_FPS,
            max_duration: Duration::from_secs(DEFAULT_GIF_MAX_DURATION_SECS),
        }
    }
}

#[async_trait]
pub trait GifConverter: Send + Sync {
    /// Turn the uploaded video into GIF bytes.
    async fn convert(&self, video: &UploadedVideo, options: &GifOptions) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_file_name() {
        assert_eq!(
            VideoFormat::from_file_name("clip.mp4"),
            Some(VideoFormat::Mp4)
        );
        assert_eq!(
            VideoFormat::from_file_name("CLIP.MOV"),
            Some(VideoFormat::Mov)
        );
        assert_eq!(
            VideoFormat::from_file_name("a.b.avi"),
            Some(VideoFormat::Avi)
        );
        assert_eq!(
            VideoFormat::from_file_name("x.webm"),
            Some(VideoFormat::Webm)
        );

        assert_eq!(VideoFormat::from_file_name("notes.txt"), None);
        assert_eq!(VideoFormat::from_file_name("mp4"), None);
        assert_eq!(VideoFormat::from_file_name(""), None);
    }

    #[test]
    fn test_format_from_mime() {
        assert_eq!(VideoFormat::from_mime("video/mp4"), Some(VideoFormat::Mp4));
        assert_eq!(VideoFormat::from_mime("video/x-msvideo"), Some(VideoFormat::Avi));
        assert_eq!(VideoFormat::from_mime("video/webm"), Some(VideoFormat::Webm));
        assert_eq!(
            VideoFormat::from_mime("Video/QuickTime; charset=binary"),
            Some(VideoFormat::Mov)
        );
        assert_eq!(VideoFormat::from_mime("application/octet-stream"), None);
    }

    #[test]
    fn test_gif_file_name() {
        let video = UploadedVideo::new(vec![1u8]).with_file_name("holiday clip.mp4");
        assert_eq!(video.gif_file_name(), "holidayclip.gif");

        let video = UploadedVideo::new(vec![1u8]);
        assert_eq!(video.gif_file_name(), "file.gif");

        let video = UploadedVideo::new(vec![1u8]).with_file_name("日本.mov");
        assert_eq!(video.gif_file_name(), "file.gif");
    }

    #[test]
    fn test_with_file_name_detects_format() {
        let video = UploadedVideo::new(vec![1u8, 2, 3]).with_file_name("a.avi");
        assert_eq!(video.format, Some(VideoFormat::Avi));
        assert_eq!(video.len(), 3);
        assert!(!video.is_empty());
    }

    #[test]
    fn test_default_options() {
        let options = GifOptions::default();
        assert_eq!((options.width, options.height), (320, 240));
        assert_eq!(options.fps, 10);
        assert_eq!(options.max_frames(), 50);
    }
}
