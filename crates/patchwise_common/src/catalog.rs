//! Version catalog fetcher
//!
//! Reads the remote downloads listing and turns it into a version → URL map.
//! The cache is consulted first; a fresh hit never touches the network.

use crate::cache::{CatalogCache, CATALOG_CACHE_KEY};
use crate::config::UpdaterConfig;
use crate::transport::{HttpTransport, TransportError};
use crate::version::Version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Version → download URL
pub type Catalog = BTreeMap<Version, String>;

/// One downloadable package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub version: Version,
    pub download_url: String,
}

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog download failed: {0}")]
    Download(#[from] TransportError),

    #[error("catalog from {url} is not valid: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Downloads listing body: `{"values": [{"name": .., "links": {"self": {"href": ..}}}]}`
#[derive(Debug, Deserialize)]
struct DownloadListing {
    values: Vec<DownloadValue>,
}

#[derive(Debug, Deserialize)]
struct DownloadValue {
    name: String,
    links: DownloadLinks,
}

#[derive(Debug, Deserialize)]
struct DownloadLinks {
    #[serde(rename = "self")]
    self_link: Link,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

/// Everything needed to locate and authenticate the catalog
#[derive(Debug, Clone)]
pub struct CatalogRequest<'a> {
    pub endpoint: &'a str,
    pub workspace: &'a str,
    pub repo_slug: &'a str,
    pub branch: Option<&'a str>,
    pub credential: Option<&'a str>,
    pub ttl: Duration,
}

impl<'a> CatalogRequest<'a> {
    pub fn from_config(config: &'a UpdaterConfig) -> Self {
        Self {
            endpoint: &config.endpoint,
            workspace: &config.workspace,
            repo_slug: &config.repo_slug,
            branch: config.branch.as_deref(),
            credential: config.access_token.as_deref(),
            ttl: config.cache_ttl(),
        }
    }

    /// Endpoint with placeholders filled in and `.{branch}` appended
    pub fn url(&self) -> String {
        let mut url = self
            .endpoint
            .replace("{workspace}", self.workspace)
            .replace("{repo_slug}", self.repo_slug);
        if let Some(branch) = self.branch.filter(|b| !b.is_empty()) {
            url.push('.');
            url.push_str(branch);
        }
        url
    }
}

/// Parse a downloads listing body.
///
/// Later entries overwrite earlier ones that extract to the same version.
pub fn parse_catalog(url: &str, body: &[u8]) -> Result<Catalog, CatalogError> {
    let listing: DownloadListing =
        serde_json::from_slice(body).map_err(|source| CatalogError::Parse {
            url: url.to_string(),
            source,
        })?;

    let mut catalog = Catalog::new();
    for value in listing.values {
        let version = Version::from_display_name(&value.name);
        if let Some(previous) = catalog.insert(version.clone(), value.links.self_link.href) {
            debug!("Catalog entry {} replaces {}", version, previous);
        }
    }
    Ok(catalog)
}

/// Fetches the catalog through the cache
pub struct CatalogFetcher<'a> {
    transport: &'a dyn HttpTransport,
    cache: &'a dyn CatalogCache,
}

impl<'a> CatalogFetcher<'a> {
    pub fn new(transport: &'a dyn HttpTransport, cache: &'a dyn CatalogCache) -> Self {
        Self { transport, cache }
    }

    /// Cached catalog if fresh, otherwise one GET followed by a cache write
    pub fn fetch(&self, request: &CatalogRequest<'_>) -> Result<Catalog, CatalogError> {
        if let Some(catalog) = self.cache.get(CATALOG_CACHE_KEY) {
            debug!("Catalog cache hit ({} versions)", catalog.len());
            return Ok(catalog);
        }

        let url = request.url();
        info!("Fetching version catalog from {}", url);

        let body = self.transport.get(&url, request.credential)?;
        let catalog = parse_catalog(&url, &body)?;
        info!("Catalog lists {} versions", catalog.len());

        if let Err(e) = self.cache.set(CATALOG_CACHE_KEY, &catalog, request.ttl) {
            warn!("Failed to cache version catalog: {}", e);
        }
        Ok(catalog)
    }
}
