//! Image hosting for generated GIFs
//!
//! Uploads the encoded GIF to a third-party host and returns the public URL.

pub mod imgbb;
pub mod mock;

pub use imgbb::ImgbbClient;
pub use mock::MockImageHost;

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload `image` under `file_name` and return its public URL.
    async fn upload(&self, file_name: &str, image: Vec<u8>) -> Result<String>;
}
