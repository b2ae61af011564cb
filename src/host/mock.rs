use super::ImageHost;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory image host for tests.
///
/// Hands out URLs shaped like ImgBB's: `{base_url}/{id}/{file_name}`.
#[derive(Clone)]
pub struct MockImageHost {
    base_url: String,
    fixed_url: Option<String>,
    failure: Option<String>,
    uploads: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl MockImageHost {
    pub fn new() -> Self {
        Self {
            base_url: "https://i.ibb.co".to_string(),
            fixed_url: None,
            failure: None,
            uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Every upload is recorded and answered with exactly `url`.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.fixed_url = Some(url.into());
        self
    }

    /// Every upload fails with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn upload_count(&self) -> usize {
        self.lock().len()
    }

    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, Vec<u8>)>> {
        self.uploads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockImageHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageHost for MockImageHost {
    async fn upload(&self, file_name: &str, image: Vec<u8>) -> Result<String> {
        if let Some(message) = &self.failure {
            return Err(Error::Upload(message.clone()));
        }

        let mut uploads = self.lock();
        uploads.push((file_name.to_string(), image));
        if let Some(url) = &self.fixed_url {
            return Ok(url.clone());
        }
        Ok(format!(
            "{}/mock{}/{}",
            self.base_url,
            uploads.len(),
            file_name
        ))
    }
}
