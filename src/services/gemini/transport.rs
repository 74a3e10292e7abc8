use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::errors::GeminiError;
use super::models::{GenerateContentRequest, GenerateContentResponse, RemoteFile};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const API_VERSION: &str = "v1beta";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// The four remote operations the client needs from the provider.
///
/// Implementations perform exactly one network exchange per call; retries
/// and cancellation are layered on top by the caller.
#[async_trait]
pub trait GeminiTransport: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError>;

    async fn upload_file(
        &self,
        data: Bytes,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, GeminiError>;

    async fn get_file(&self, name: &str) -> Result<RemoteFile, GeminiError>;

    async fn delete_file(&self, name: &str) -> Result<(), GeminiError>;
}

#[derive(Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

/// REST transport for the Generative Language API.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    api_key: String,
    base_url: String,
}

impl HttpTransport {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GeminiError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            GeminiError::configuration(format!("Failed to create HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resource_url(&self, name: &str) -> String {
        format!("{}/{API_VERSION}/{}", self.base_url, name.trim_start_matches('/'))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GeminiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(GeminiError::from_reqwest_error)?;

        if !status.is_success() {
            return Err(GeminiError::from_status_and_body(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| GeminiError::Parse {
            message: format!("Failed to parse response: {e}"),
        })
    }

    async fn start_upload(
        &self,
        size: usize,
        mime_type: &str,
        display_name: &str,
    ) -> Result<String, GeminiError> {
        let url = format!("{}/upload/{API_VERSION}/files", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(GeminiError::from_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::from_status_and_body(status, &body));
        }

        response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| GeminiError::Parse {
                message: "Upload start response is missing the X-Goog-Upload-URL header"
                    .to_string(),
            })
    }
}

#[async_trait]
impl GeminiTransport for HttpTransport {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let model = model.trim_start_matches("models/");
        let url = format!(
            "{}/{API_VERSION}/models/{model}:generateContent",
            self.base_url
        );

        tracing::debug!(model, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(GeminiError::from_reqwest_error)?;

        Self::read_json(response).await
    }

    async fn upload_file(
        &self,
        data: Bytes,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, GeminiError> {
        let upload_url = self
            .start_upload(data.len(), mime_type, display_name)
            .await?;

        tracing::debug!(display_name, size = data.len(), "Uploading file bytes");

        let response = self
            .client
            .post(&upload_url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", "0")
            .header("Content-Type", mime_type)
            .body(data)
            .send()
            .await
            .map_err(GeminiError::from_reqwest_error)?;

        let uploaded: UploadResponse = Self::read_json(response).await?;
        Ok(uploaded.file)
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, GeminiError> {
        let response = self
            .client
            .get(self.resource_url(name))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(GeminiError::from_reqwest_error)?;

        Self::read_json(response).await
    }

    async fn delete_file(&self, name: &str) -> Result<(), GeminiError> {
        let response = self
            .client
            .delete(self.resource_url(name))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(GeminiError::from_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(GeminiError::from_status_and_body(status, &body))
        }
    }
}
