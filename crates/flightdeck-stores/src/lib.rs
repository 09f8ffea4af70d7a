//! Flightdeck Stores - preview server client and upload pipeline
//!
//! This crate talks to the preview server: the chunked multipart upload
//! used by `flightdeck share`, artifact introspection (APK badging, app
//! bundle `Info.plist`, binary identity) and preview resolution by id,
//! deep link or display name.

pub mod android;
pub mod apple;
pub mod archive;
pub mod binary_id;
pub mod client;
pub mod error;
pub mod git;
pub mod multipart;
pub mod resolver;
pub mod tools;
pub mod traits;
pub mod types;
pub mod upload;

pub use android::{ApkMetadata, ApkMetadataService};
pub use client::{HttpPartUploader, ServerClient, ServerClientProvider};
pub use error::{Result, StoreError};
pub use git::GitProvenance;
pub use multipart::{ArtifactMultipartUploader, UploadSettings};
pub use resolver::{PreviewLink, PreviewReference, PreviewResolver};
pub use traits::{PartUploader, PreviewsService, ServiceProvider};
pub use upload::{ArtifactInspector, PreviewUploadPipeline, ShareOptions};
