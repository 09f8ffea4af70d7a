//! Seams between the upload/resolve logic and the network

use std::sync::Arc;

use async_trait::async_trait;
use flightdeck_core::Preview;
use url::Url;

use crate::error::Result;
use crate::types::*;

/// Authenticated calls against the preview server.
///
/// Every call is scoped to a project `full_handle` (`account/project`).
#[async_trait]
pub trait PreviewsService: Send + Sync {
    /// Register a build and open a multipart session
    async fn start_upload(&self, request: &StartUploadRequest) -> Result<StartUploadResponse>;

    /// Signed URL for one chunk
    async fn generate_upload_url(&self, request: &GenerateUrlRequest) -> Result<String>;

    /// Finish a multipart session, returning the resulting preview
    async fn complete_upload(&self, request: &CompleteUploadRequest) -> Result<Preview>;

    /// Signed URL the preview icon is PUT to
    async fn generate_icon_upload_url(&self, full_handle: &str, preview_id: &str)
        -> Result<String>;

    /// Fetch a preview by id
    async fn get_preview(&self, full_handle: &str, preview_id: &str) -> Result<Preview>;

    /// Search previews
    async fn list_previews(&self, full_handle: &str, query: &PreviewQuery) -> Result<PreviewPage>;
}

/// Unauthenticated PUTs to signed storage URLs
#[async_trait]
pub trait PartUploader: Send + Sync {
    /// Upload `body`, returning the ETag header if the store sent one
    async fn put(&self, url: &str, body: Vec<u8>, content_type: &str) -> Result<Option<String>>;
}

/// Produces a `PreviewsService` for a given server.
///
/// Deep links carry their own host, so resolution may talk to a server
/// other than the configured one.
pub trait ServiceProvider: Send + Sync {
    fn service_for(&self, server_url: &Url) -> Result<Arc<dyn PreviewsService>>;
}
