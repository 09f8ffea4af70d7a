//! HTTP implementation of the preview server contract

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flightdeck_core::config::ENV_TOKEN;
use flightdeck_core::{Config, Preview};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{Result, StoreError};
use crate::traits::{PartUploader, PreviewsService, ServiceProvider};
use crate::types::*;

/// Preview server client authenticated with a bearer token
#[derive(Debug, Clone)]
pub struct ServerClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl ServerClient {
    pub fn new(base_url: Url, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flightdeck/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Client for the configured server, token taken from `FLIGHTDECK_TOKEN`
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.server_url).map_err(|e| {
            StoreError::ConfigurationError(format!("invalid server_url {}: {}", config.server_url, e))
        })?;
        Self::new(
            base_url,
            token_from_env(),
            Duration::from_secs(config.upload.timeout_secs),
        )
    }

    fn endpoint(&self, full_handle: &str, path: &str) -> String {
        format!(
            "{}/api/projects/{}/previews{}",
            self.base_url.as_str().trim_end_matches('/'),
            full_handle,
            path
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Send a request and decode the JSON response
    async fn api_request<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "server response");

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let message = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    StoreError::AuthenticationFailed(message)
                }
                StatusCode::TOO_MANY_REQUESTS => StoreError::RateLimited { retry_after },
                _ => StoreError::ApiError {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PreviewsService for ServerClient {
    async fn start_upload(&self, request: &StartUploadRequest) -> Result<StartUploadResponse> {
        let url = self.endpoint(&request.full_handle, "/start");
        self.api_request(self.request(Method::POST, &url).json(request))
            .await
    }

    async fn generate_upload_url(&self, request: &GenerateUrlRequest) -> Result<String> {
        let url = self.endpoint(&request.full_handle, "/generate-url");
        let response: SignedUrlResponse = self
            .api_request(self.request(Method::POST, &url).json(request))
            .await?;
        Ok(response.url)
    }

    async fn complete_upload(&self, request: &CompleteUploadRequest) -> Result<Preview> {
        let url = self.endpoint(&request.full_handle, "/complete");
        self.api_request(self.request(Method::POST, &url).json(request))
            .await
    }

    async fn generate_icon_upload_url(
        &self,
        full_handle: &str,
        preview_id: &str,
    ) -> Result<String> {
        let url = self.endpoint(full_handle, &format!("/{}/icons", preview_id));
        let response: SignedUrlResponse = self
            .api_request(self.request(Method::POST, &url))
            .await?;
        Ok(response.url)
    }

    async fn get_preview(&self, full_handle: &str, preview_id: &str) -> Result<Preview> {
        let url = self.endpoint(full_handle, &format!("/{}", preview_id));
        match self.api_request(self.request(Method::GET, &url)).await {
            Err(StoreError::ApiError { status: 404, .. }) => {
                Err(StoreError::PreviewNotFound(preview_id.to_string()))
            }
            other => other,
        }
    }

    async fn list_previews(&self, full_handle: &str, query: &PreviewQuery) -> Result<PreviewPage> {
        let url = self.endpoint(full_handle, "");
        self.api_request(self.request(Method::GET, &url).query(&query.to_pairs()))
            .await
    }
}

/// PUTs chunks and icons to signed storage URLs
#[derive(Debug, Clone)]
pub struct HttpPartUploader {
    client: Client,
}

impl HttpPartUploader {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl PartUploader for HttpPartUploader {
    async fn put(&self, url: &str, body: Vec<u8>, content_type: &str) -> Result<Option<String>> {
        let length = body.len();
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, length)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }
}

/// Builds `ServerClient`s sharing one token and timeout
#[derive(Debug, Clone)]
pub struct ServerClientProvider {
    token: Option<String>,
    timeout: Duration,
}

impl ServerClientProvider {
    pub fn new(token: Option<String>, timeout: Duration) -> Self {
        Self { token, timeout }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            token_from_env(),
            Duration::from_secs(config.download.timeout_secs),
        )
    }
}

impl ServiceProvider for ServerClientProvider {
    fn service_for(&self, server_url: &Url) -> Result<Arc<dyn PreviewsService>> {
        Ok(Arc::new(ServerClient::new(
            server_url.clone(),
            self.token.clone(),
            self.timeout,
        )?))
    }
}

fn token_from_env() -> Option<String> {
    std::env::var(ENV_TOKEN)
        .ok()
        .filter(|token| !token.trim().is_empty())
}
