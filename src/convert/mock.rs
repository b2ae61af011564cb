use super::{GifConverter, GifOptions, UploadedVideo, VideoFormat};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Smallest valid GIF: one transparent pixel.
pub const TINY_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// In-memory converter for tests: returns canned bytes or a canned failure.
#[derive(Clone)]
pub struct MockGifConverter {
    output: Vec<u8>,
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
    seen_formats: Arc<Mutex<Vec<Option<VideoFormat>>>>,
}

impl MockGifConverter {
    pub fn new() -> Self {
        Self {
            output: TINY_GIF.to_vec(),
            failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_formats: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_output(mut self, output: Vec<u8>) -> Self {
        self.output = output;
        self
    }

    /// Every conversion fails with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_formats(&self) -> Vec<Option<VideoFormat>> {
        self.seen_formats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockGifConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GifConverter for MockGifConverter {
    async fn convert(&self, video: &UploadedVideo, _options: &GifOptions) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_formats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(video.format);

        match &self.failure {
            Some(message) => Err(Error::Conversion(message.clone())),
            None => Ok(self.output.clone()),
        }
    }
}
