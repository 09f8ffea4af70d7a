//! Resolving preview references to previews

use std::sync::Arc;

use flightdeck_core::{PlatformTag, Preview};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{Result, StoreError};
use crate::traits::ServiceProvider;
use crate::types::PreviewQuery;

/// Specifier used when a display name is given without one
pub const DEFAULT_SPECIFIER: &str = "latest";

/// Minimum path segments of a deep link: account, project, ..., id
const MIN_LINK_SEGMENTS: usize = 4;

/// What the user asked to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewReference {
    /// `scheme://host[:port]/<account>/<project>/.../previews/<id>`
    Link(Url),
    /// A preview id within the configured project
    Id(String),
    /// Newest preview with this display name matching `specifier`
    Name {
        display_name: String,
        specifier: String,
    },
}

impl PreviewReference {
    /// Absolute URLs are links; anything else is `name` or `name@specifier`
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Ok(url) = Url::parse(input) {
            if url.has_host() {
                return Self::Link(url);
            }
        }

        match input.rsplit_once('@') {
            Some((name, specifier)) if !name.is_empty() && !specifier.is_empty() => Self::Name {
                display_name: name.to_string(),
                specifier: specifier.to_string(),
            },
            _ => Self::Name {
                display_name: input.to_string(),
                specifier: DEFAULT_SPECIFIER.to_string(),
            },
        }
    }
}

/// Components of a preview deep link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewLink {
    /// `scheme://host[:port]` of the server hosting the preview
    pub server_url: Url,
    pub full_handle: String,
    pub preview_id: String,
}

impl PreviewLink {
    pub fn parse(link: &Url) -> Result<Self> {
        let invalid = || StoreError::InvalidPreviewUrl(link.to_string());

        if !link.has_host() {
            return Err(invalid());
        }

        let segments: Vec<&str> = link
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        if segments.len() < MIN_LINK_SEGMENTS {
            return Err(invalid());
        }

        let mut server_url = link.clone();
        server_url.set_path("");
        server_url.set_query(None);
        server_url.set_fragment(None);

        Ok(Self {
            server_url,
            full_handle: format!("{}/{}", segments[0], segments[1]),
            preview_id: segments[segments.len() - 1].to_string(),
        })
    }
}

/// Fetches previews by id, deep link or display name
pub struct PreviewResolver {
    provider: Arc<dyn ServiceProvider>,
    server_url: Url,
    full_handle: Option<String>,
}

impl PreviewResolver {
    /// `server_url` and `full_handle` apply to references that carry neither
    pub fn new(provider: Arc<dyn ServiceProvider>, server_url: Url, full_handle: Option<String>) -> Self {
        Self {
            provider,
            server_url,
            full_handle,
        }
    }

    /// Resolve any reference; `platforms` narrows name searches
    pub async fn resolve(&self, reference: &PreviewReference, platforms: &[PlatformTag]) -> Result<Preview> {
        match reference {
            PreviewReference::Link(link) => self.by_link(link).await,
            PreviewReference::Id(preview_id) => {
                let handle = self.full_handle()?;
                self.by_id(preview_id, handle, &self.server_url).await
            }
            PreviewReference::Name {
                display_name,
                specifier,
            } => {
                let handle = self.full_handle()?;
                self.by_name(display_name, specifier, platforms, handle).await
            }
        }
    }

    #[instrument(skip(self), fields(server = %server_url))]
    pub async fn by_id(&self, preview_id: &str, full_handle: &str, server_url: &Url) -> Result<Preview> {
        let service = self.provider.service_for(server_url)?;
        let preview = service.get_preview(full_handle, preview_id).await?;
        Ok(checked(preview))
    }

    pub async fn by_link(&self, link: &Url) -> Result<Preview> {
        let parsed = PreviewLink::parse(link)?;
        debug!(?parsed, "parsed preview link");
        self.by_id(&parsed.preview_id, &parsed.full_handle, &parsed.server_url)
            .await
    }

    #[instrument(skip(self))]
    pub async fn by_name(
        &self,
        display_name: &str,
        specifier: &str,
        platforms: &[PlatformTag],
        full_handle: &str,
    ) -> Result<Preview> {
        let service = self.provider.service_for(&self.server_url)?;
        let query = PreviewQuery {
            display_name: Some(display_name.to_string()),
            specifier: Some(specifier.to_string()),
            supported_platforms: platforms.to_vec(),
            page: 1,
            page_size: 1,
        };

        let page = service.list_previews(full_handle, &query).await?;
        page.previews
            .into_iter()
            .next()
            .map(checked)
            .ok_or_else(|| StoreError::PreviewNotFound(format!("{}@{}", display_name, specifier)))
    }

    fn full_handle(&self) -> Result<&str> {
        self.full_handle.as_deref().ok_or(StoreError::MissingFullHandle)
    }
}

fn checked(preview: Preview) -> Preview {
    if !preview.has_consistent_platforms() {
        warn!(preview_id = %preview.id, "preview builds declare platforms the preview does not");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::tests::{preview_from, start_request, MockService};
    use crate::traits::PreviewsService;
    use std::sync::Mutex;

    struct RecordingProvider {
        service: Arc<MockService>,
        servers: Mutex<Vec<String>>,
    }

    impl ServiceProvider for RecordingProvider {
        fn service_for(&self, server_url: &Url) -> Result<Arc<dyn PreviewsService>> {
            self.servers.lock().unwrap().push(server_url.to_string());
            Ok(self.service.clone())
        }
    }

    fn resolver_with(previews: Vec<Preview>) -> (PreviewResolver, Arc<RecordingProvider>) {
        let service = Arc::new(MockService::default());
        *service.search_results.lock().unwrap() = previews;
        let provider = Arc::new(RecordingProvider {
            service,
            servers: Mutex::new(Vec::new()),
        });
        let resolver = PreviewResolver::new(
            provider.clone(),
            Url::parse("https://api.flightdeck.dev").unwrap(),
            Some("acme/app".into()),
        );
        (resolver, provider)
    }

    #[test]
    fn test_parse_link() {
        let link = Url::parse("https://x/tuist/tuist/previews/some-id?foo=bar").unwrap();
        let parsed = PreviewLink::parse(&link).unwrap();
        assert_eq!(parsed.full_handle, "tuist/tuist");
        assert_eq!(parsed.preview_id, "some-id");
        assert_eq!(parsed.server_url.as_str(), "https://x/");

        let local = Url::parse("http://localhost:8080/acme/app/previews/abc").unwrap();
        assert_eq!(
            PreviewLink::parse(&local).unwrap().server_url.as_str(),
            "http://localhost:8080/"
        );
    }

    #[test]
    fn test_short_link_is_invalid() {
        let link = Url::parse("https://x/tuist/previews/some-id").unwrap();
        assert!(matches!(
            PreviewLink::parse(&link),
            Err(StoreError::InvalidPreviewUrl(_))
        ));
    }

    #[test]
    fn test_parse_reference() {
        assert!(matches!(
            PreviewReference::parse("https://x/a/b/previews/c"),
            PreviewReference::Link(_)
        ));
        assert_eq!(
            PreviewReference::parse("App"),
            PreviewReference::Name {
                display_name: "App".into(),
                specifier: "latest".into()
            }
        );
        assert_eq!(
            PreviewReference::parse("App@feature/login"),
            PreviewReference::Name {
                display_name: "App".into(),
                specifier: "feature/login".into()
            }
        );
    }

    #[tokio::test]
    async fn test_link_uses_link_server() {
        let preview = preview_from(&start_request(), "some-id");
        let (resolver, provider) = resolver_with(vec![preview]);

        let reference = PreviewReference::parse("http://localhost:8080/tuist/tuist/previews/some-id");
        let resolved = resolver.resolve(&reference, &[]).await.unwrap();
        assert_eq!(resolved.id, "some-id");
        assert_eq!(*provider.servers.lock().unwrap(), vec!["http://localhost:8080/".to_string()]);
    }

    #[tokio::test]
    async fn test_name_search_uses_page_size_one() {
        let mut other = preview_from(&start_request(), "other");
        other.display_name = Some("Other".into());
        let wanted = preview_from(&start_request(), "wanted");
        let (resolver, provider) = resolver_with(vec![other, wanted]);

        let reference = PreviewReference::parse("Example App");
        let resolved = resolver
            .resolve(&reference, &[PlatformTag::Android])
            .await
            .unwrap();
        assert_eq!(resolved.id, "wanted");

        let queries = provider.service.queries.lock().unwrap();
        assert_eq!(queries[0].page_size, 1);
        assert_eq!(queries[0].page, 1);
        assert_eq!(queries[0].specifier.as_deref(), Some("latest"));
        assert_eq!(queries[0].supported_platforms, vec![PlatformTag::Android]);
    }

    #[tokio::test]
    async fn test_empty_search_is_not_found() {
        let (resolver, _) = resolver_with(vec![]);
        let err = resolver
            .resolve(&PreviewReference::parse("Ghost"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PreviewNotFound(_)));
    }

    #[tokio::test]
    async fn test_id_requires_handle() {
        let service = Arc::new(MockService::default());
        let provider = Arc::new(RecordingProvider {
            service,
            servers: Mutex::new(Vec::new()),
        });
        let resolver = PreviewResolver::new(
            provider,
            Url::parse("https://api.flightdeck.dev").unwrap(),
            None,
        );
        let err = resolver
            .resolve(&PreviewReference::Id("abc".into()), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingFullHandle));
    }
}
