#![allow(dead_code)]

use reqwest::multipart::{Form, Part};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use video2gif::{AppState, GifConverter, GifOptions, ImageHost};

/// Runs the real router on an ephemeral port with the given collaborators.
pub struct TestServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(
        converter: impl GifConverter + 'static,
        host: impl ImageHost + 'static,
    ) -> Self {
        Self::start_with_limit(converter, host, 20).await
    }

    pub async fn start_with_limit(
        converter: impl GifConverter + 'static,
        host: impl ImageHost + 'static,
        max_upload_mb: u64,
    ) -> Self {
        let state = AppState::new(
            Arc::new(converter),
            Arc::new(host),
            GifOptions::default(),
            max_upload_mb,
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            video2gif::serve(listener, state)
                .await
                .expect("Test server error");
        });

        let server = TestServer { addr, handle };

        // Poll until server is ready
        let client = server.client();
        for _ in 0..200 {
            if let Ok(response) = client.get(server.url("/health")).send().await
                && response.status().is_success()
            {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        server
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap()
    }

    pub async fn post_form(
        &self,
        client: &reqwest::Client,
        path: &str,
        form: Form,
    ) -> reqwest::Response {
        client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .expect("Request failed")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A form with a single `video` file field.
pub fn video_form(file_name: &str, mime: &str, data: Vec<u8>) -> Form {
    let part = Part::bytes(data)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .unwrap();
    Form::new().part("video", part)
}

/// Bytes that look like the start of an MP4 file.
pub fn small_mp4() -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x20];
    data.extend_from_slice(b"ftypisom");
    data.resize(2048, 0x11);
    data
}
