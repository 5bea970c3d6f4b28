use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::types::{CompletionRequest, CompletionResponse, FileUploadResponse};
use crate::config::{BackendConfig, RequestConfig};
use crate::error::{BackendError, BackendResult};

/// HTTP client for the generation backend, shared by authoring and rendering
#[derive(Clone)]
pub struct GenerationClient {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl GenerationClient {
    /// Create a new generation client
    pub fn new(config: &BackendConfig, request_config: RequestConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(BackendError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a backend path or absolute URL
    pub fn url(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}/{}", self.base_url, path_or_url.trim_start_matches('/'))
        }
    }

    /// Run a text completion
    pub async fn complete(&self, request: CompletionRequest) -> BackendResult<CompletionResponse> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Requesting completion"
        );
        self.post_json("v1/completions", &request).await
    }

    /// POST a JSON body and parse a JSON response, with retries
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> BackendResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = &self.url(path);
        self.send_with_retry(path, move || async move {
            let response = self.send(self.client.post(url).json(body)).await?;
            parse_json(response).await
        })
        .await
    }

    /// GET a JSON resource, with retries
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> BackendResult<T> {
        let url = &self.url(path);
        self.send_with_retry(path, move || async move {
            let response = self.send(self.client.get(url)).await?;
            parse_json(response).await
        })
        .await
    }

    /// Upload raw file bytes, returning the backend reference
    pub async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> BackendResult<String> {
        let url = &self.url("v1/files");
        let bytes = &bytes;
        let uploaded: FileUploadResponse = self
            .send_with_retry("v1/files", move || async move {
                let request = self
                    .client
                    .post(url)
                    .header("Content-Type", content_type)
                    .body(bytes.clone());
                let response = self.send(request).await?;
                parse_json(response).await
            })
            .await?;
        Ok(uploaded.uri)
    }

    /// Download a resource to `destination`, creating parent directories
    pub async fn download(&self, path_or_url: &str, destination: &Path) -> BackendResult<u64> {
        let url = &self.url(path_or_url);
        let bytes = self
            .send_with_retry(path_or_url, move || async move {
                let response = self.send(self.client.get(url)).await?;
                response.bytes().await.map_err(BackendError::Http)
            })
            .await?;

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::InvalidResponse {
                    message: format!("Failed to create {}: {}", parent.display(), e),
                })?;
        }
        tokio::fs::write(destination, &bytes)
            .await
            .map_err(|e| BackendError::InvalidResponse {
                message: format!("Failed to write {}: {}", destination.display(), e),
            })?;

        debug!(path = %destination.display(), bytes = bytes.len(), "Downloaded artifact");
        Ok(bytes.len() as u64)
    }

    /// Retry an operation with exponential backoff
    async fn send_with_retry<T, F, Fut>(&self, label: &str, operation: F) -> BackendResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    endpoint = %label,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying generation request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match operation().await {
                Ok(response) => {
                    info!(
                        endpoint = %label,
                        latency_ms = start.elapsed().as_millis(),
                        "Generation request succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    error!(
                        endpoint = %label,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Generation request failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(BackendError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    /// Send a single authorized request and check its status (internal)
    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    BackendError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        Ok(response)
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    response
        .json()
        .await
        .map_err(|e| BackendError::InvalidResponse {
            message: format!("Failed to parse response: {}", e),
        })
}
