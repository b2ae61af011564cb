use super::ImageHost;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    data: Option<UploadedImage>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct UploadedImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl UploadResponse {
    fn is_success(&self) -> bool {
        self.success == Some(true) || self.status == Some(200)
    }
}

/// Client for the ImgBB upload API.
pub struct ImgbbClient {
    client: reqwest::Client,
    api_key: String,
    upload_url: String,
}

impl ImgbbClient {
    pub fn new(api_key: String, upload_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new_with_client(api_key, upload_url, client))
    }

    pub fn new_with_client(api_key: String, upload_url: String, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key,
            upload_url,
        }
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }
}

#[async_trait]
impl ImageHost for ImgbbClient {
    async fn upload(&self, file_name: &str, image: Vec<u8>) -> Result<String> {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let size = image.len();
        let part = Part::bytes(image)
            .file_name(file_name.to_string())
            .mime_str(mime.essence_str())?;
        let form = Form::new().part("image", part);

        debug!(file_name, size, url = %self.upload_url, "Uploading image to ImgBB");
        let response = self
            .client
            .post(&self.upload_url)
            .query(&[("key", self.api_key.as_str())])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed = serde_json::from_str::<UploadResponse>(&body).unwrap_or_default();

        if status.is_success() && parsed.is_success() {
            let url = parsed
                .data
                .map(|data| data.url)
                .filter(|url| !url.is_empty())
                .ok_or_else(|| Error::Upload("ImgBB response carried no image URL".into()))?;
            return Ok(url);
        }

        let message = parsed
            .error
            .map(|error| error.message)
            .unwrap_or_else(|| "Unknown error".to_string());
        error!(%status, %message, "ImgBB API error");
        Err(Error::Upload(format!(
            "ImgBB API error: {message} (status {})",
            status.as_u16()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_client(server: &MockServer, api_key: &str) -> ImgbbClient {
        ImgbbClient::new(
            api_key.to_string(),
            format!("{}/1/upload", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_upload_returns_hosted_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/1/upload"))
            .and(query_param("key", "test-key"))
            .and(body_string_contains("filename=\"clip.gif\""))
            .and(body_string_contains("image/gif"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "id": "2ndCYJK",
                    "url": "https://i.ibb.co/2ndCYJK/clip.gif",
                    "display_url": "https://i.ibb.co/2ndCYJK/clip.gif"
                },
                "success": true,
                "status": 200
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key");
        let url = client
            .upload("clip.gif", b"GIF89a".to_vec())
            .await
            .unwrap();

        assert_eq!(url, "https://i.ibb.co/2ndCYJK/clip.gif");
    }

    #[tokio::test]
    async fn test_api_error_message_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "status_code": 400,
                "error": { "message": "Invalid API v1 key.", "code": 100 },
                "status_txt": "Bad Request"
            })))
            .mount(&server)
            .await;

        let client = make_client(&server, "bad-key");
        let err = client.upload("clip.gif", b"GIF89a".to_vec()).await.unwrap_err();

        assert!(matches!(err, Error::Upload(_)));
        let message = err.to_string();
        assert!(message.contains("Invalid API v1 key."), "{message}");
        assert!(message.contains("status 400"), "{message}");
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key");
        let err = client.upload("clip.gif", b"GIF89a".to_vec()).await.unwrap_err();

        assert!(err.to_string().contains("Unknown error"));
    }

    #[tokio::test]
    async fn test_success_flag_false_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "status": 400,
                "error": { "message": "Empty upload source." }
            })))
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key");
        let err = client.upload("clip.gif", Vec::new()).await.unwrap_err();

        assert!(err.to_string().contains("Empty upload source."));
    }

    #[tokio::test]
    async fn test_missing_url_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "url": "" },
                "success": true,
                "status": 200
            })))
            .mount(&server)
            .await;

        let client = make_client(&server, "test-key");
        let err = client.upload("clip.gif", b"GIF89a".to_vec()).await.unwrap_err();

        assert!(err.to_string().contains("no image URL"));
    }

    #[tokio::test]
    async fn test_network_error_is_an_http_error() {
        // nothing listens on the port of a dropped listener
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client = ImgbbClient::new(
            "test-key".to_string(),
            format!("http://127.0.0.1:{port}/1/upload"),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.upload("clip.gif", b"GIF89a".to_vec()).await.unwrap_err();

        assert!(matches!(err, Error::Http(_)));
    }
}
