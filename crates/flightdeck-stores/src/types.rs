//! Wire types of the preview server

use std::collections::BTreeSet;

use flightdeck_core::{ArtifactType, PlatformTag, Preview};
use serde::{Deserialize, Serialize};

/// Body of the Start call, describing the build being uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartUploadRequest {
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub build_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_identifier: Option<String>,
    pub supported_platforms: BTreeSet<PlatformTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    pub binary_id: String,
    pub full_handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartUploadResponse {
    pub app_build_id: String,
    pub upload_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateUrlRequest {
    pub app_build_id: String,
    pub part_number: u32,
    pub upload_id: String,
    pub full_handle: String,
    pub content_length: u64,
}

/// A signed URL returned by the server
#[derive(Debug, Clone, Deserialize)]
pub struct SignedUrlResponse {
    pub url: String,
}

/// One uploaded chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub number: u32,
    pub etag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompleteUploadRequest {
    pub app_build_id: String,
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
    pub full_handle: String,
}

/// State of one multipart session.
///
/// Part numbers are assigned here so they always run 1, 2, 3... in the
/// order chunks were uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub app_build_id: String,
    pub upload_id: String,
    parts: Vec<CompletedPart>,
}

impl UploadSession {
    pub fn new(started: StartUploadResponse) -> Self {
        Self {
            app_build_id: started.app_build_id,
            upload_id: started.upload_id,
            parts: Vec::new(),
        }
    }

    /// Number the next chunk will be uploaded as
    pub fn next_part_number(&self) -> u32 {
        self.parts.len() as u32 + 1
    }

    /// Record the ETag of the chunk numbered `next_part_number()`
    pub fn record(&mut self, etag: String) {
        let number = self.next_part_number();
        self.parts.push(CompletedPart { number, etag });
    }

    pub fn parts(&self) -> &[CompletedPart] {
        &self.parts
    }

    pub fn into_complete_request(self, full_handle: &str) -> CompleteUploadRequest {
        CompleteUploadRequest {
            app_build_id: self.app_build_id,
            upload_id: self.upload_id,
            parts: self.parts,
            full_handle: full_handle.to_string(),
        }
    }
}

/// Search parameters for previews
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewQuery {
    pub display_name: Option<String>,
    pub specifier: Option<String>,
    pub supported_platforms: Vec<PlatformTag>,
    pub page: u32,
    pub page_size: u32,
}

impl PreviewQuery {
    /// Query string pairs, platforms repeated as `supported_platforms[]`
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(name) = &self.display_name {
            pairs.push(("display_name", name.clone()));
        }
        if let Some(specifier) = &self.specifier {
            pairs.push(("specifier", specifier.clone()));
        }
        for platform in &self.supported_platforms {
            pairs.push(("supported_platforms[]", platform.as_str().to_string()));
        }
        pairs.push(("page", self.page.to_string()));
        pairs.push(("page_size", self.page_size.to_string()));
        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaginationMetadata {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub has_next_page: bool,
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PreviewPage {
    pub previews: Vec<Preview>,
    #[serde(default)]
    pub pagination_metadata: Option<PaginationMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_numbers_parts_from_one() {
        let mut session = UploadSession::new(StartUploadResponse {
            app_build_id: "build".into(),
            upload_id: "upload".into(),
        });
        assert_eq!(session.next_part_number(), 1);
        session.record("etag-a".into());
        session.record("etag-b".into());

        let numbers: Vec<u32> = session.parts().iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2]);

        let request = session.into_complete_request("acme/app");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["parts"][1]["number"], 2);
        assert_eq!(json["parts"][1]["etag"], "etag-b");
        assert_eq!(json["full_handle"], "acme/app");
    }

    #[test]
    fn test_start_request_serialization() {
        let request = StartUploadRequest {
            artifact_type: ArtifactType::Apk,
            display_name: "Example App".into(),
            version: Some("1.0.0".into()),
            build_version: "42".into(),
            bundle_identifier: None,
            supported_platforms: [PlatformTag::Android].into_iter().collect(),
            git_branch: None,
            git_commit_sha: None,
            git_ref: None,
            binary_id: "abc".into(),
            full_handle: "acme/app".into(),
            track: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "apk");
        assert_eq!(json["supported_platforms"][0], "android");
        assert!(json.get("bundle_identifier").is_none());
        assert!(json.get("track").is_none());
    }

    #[test]
    fn test_query_pairs() {
        let query = PreviewQuery {
            display_name: Some("App".into()),
            specifier: Some("latest".into()),
            supported_platforms: vec![PlatformTag::Ios, PlatformTag::IosSimulator],
            page: 1,
            page_size: 1,
        };
        let pairs = query.to_pairs();
        assert_eq!(pairs[0], ("display_name", "App".to_string()));
        assert_eq!(pairs[2], ("supported_platforms[]", "ios".to_string()));
        assert_eq!(pairs[3], ("supported_platforms[]", "ios_simulator".to_string()));
        assert_eq!(pairs.last().unwrap(), &("page_size", "1".to_string()));
    }
}
