//! Edge cache: versioned asset and API response caching in front of the network.
//!
//! Two namespaces are active at any time. The asset namespace is filled from a
//! fixed manifest at install and served cache-first. The data namespace holds
//! the last successful response of each API URL and is only consulted when the
//! network fails. Activation deletes every namespace that is not current.

mod fetcher;
mod notification;
mod storage;

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::util::normalize_base_url;

pub use fetcher::{Fetcher, HttpFetcher};
pub use notification::{ClientHost, Notification, DEFAULT_BODY, DEFAULT_TITLE, NOTIFICATION_ICON};
pub use storage::{CacheStorage, LibSqlCacheStorage, MemoryCacheStorage};

/// URL opened when a notification is clicked.
pub const ROOT_VIEW: &str = "/";

/// Static files pre-cached at install.
pub const DEFAULT_ASSET_MANIFEST: [&str; 10] = [
    "./",
    "./index.html",
    "./favicon.png",
    "./styles/styles.css",
    "./scripts/index.js",
    "./scripts/pages/home/home-page.js",
    "./scripts/pages/home/home-presenter.js",
    "./scripts/pages/add/add-presenter.js",
    "./scripts/utils/indexeddb.js",
    "./scripts/config.js",
];

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

impl EdgeRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// A network or cached response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl EdgeResponse {
    /// A `200` response with a content type.
    pub fn ok(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: BTreeMap::from([("content-type".to_string(), content_type.to_string())]),
            body,
        }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub response: EdgeResponse,
    pub source: ResponseSource,
}

/// The current namespace pair. Bumping either name retires the old one on
/// the next activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheVersions {
    pub assets: String,
    pub data: String,
}

impl Default for CacheVersions {
    fn default() -> Self {
        Self {
            assets: "app-cache-v1".to_string(),
            data: "data-cache-v1".to_string(),
        }
    }
}

impl CacheVersions {
    pub fn is_current(&self, namespace: &str) -> bool {
        namespace == self.assets || namespace == self.data
    }
}

/// Lifecycle of a single namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceState {
    /// Current but holds no entries.
    Empty,
    /// Current and holds entries.
    Populated,
    /// Not current any more; removed on the next activation.
    Stale,
    /// Removed by an activation.
    Purged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeCacheConfig {
    pub versions: CacheVersions,
    /// Regex matched against request URLs to select the network-first path.
    pub api_pattern: String,
    /// Origin that relative manifest entries resolve against.
    pub origin: String,
    pub asset_manifest: Vec<String>,
}

impl Default for EdgeCacheConfig {
    fn default() -> Self {
        Self {
            versions: CacheVersions::default(),
            api_pattern: "/stories".to_string(),
            origin: "http://localhost:8080".to_string(),
            asset_manifest: DEFAULT_ASSET_MANIFEST.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    /// Manifest URLs that could not be fetched, with the reason.
    pub failed: Vec<(String, String)>,
    /// Namespaces removed by the activation that follows install.
    pub purged: Vec<String>,
}

/// Request interceptor with an explicit install/activate lifecycle.
pub struct EdgeCache<C, F> {
    storage: C,
    fetcher: F,
    versions: CacheVersions,
    api_pattern: Regex,
    origin: String,
    manifest: Vec<String>,
    purged: Mutex<HashSet<String>>,
}

impl<C: CacheStorage, F: Fetcher> EdgeCache<C, F> {
    pub fn new(storage: C, fetcher: F, config: EdgeCacheConfig) -> Result<Self> {
        let api_pattern = Regex::new(&config.api_pattern).map_err(|error| {
            Error::InvalidInput(format!("Invalid API pattern '{}': {error}", config.api_pattern))
        })?;
        let origin = normalize_base_url(&config.origin).map_err(Error::InvalidInput)?;

        Ok(Self {
            storage,
            fetcher,
            versions: config.versions,
            api_pattern,
            origin,
            manifest: config.asset_manifest,
            purged: Mutex::new(HashSet::new()),
        })
    }

    pub const fn storage(&self) -> &C {
        &self.storage
    }

    pub const fn versions(&self) -> &CacheVersions {
        &self.versions
    }

    /// Resolve a manifest entry (`./x`, `/x` or an absolute URL) against the origin.
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let relative = path.trim_start_matches("./").trim_start_matches('/');
        format!("{}/{}", self.origin, relative)
    }

    pub fn is_api_request(&self, url: &str) -> bool {
        self.api_pattern.is_match(url)
    }

    /// Pre-cache the asset manifest, then activate immediately.
    pub async fn install(&self, host: &impl ClientHost) -> Result<InstallReport> {
        tracing::info!("Installing edge cache {}", self.versions.assets);
        self.storage.open(&self.versions.assets).await?;

        let mut report = InstallReport::default();
        for entry in &self.manifest {
            let url = self.resolve(entry);
            match self.fetcher.fetch(&EdgeRequest::get(url.clone())).await {
                Ok(response) if response.status == 200 => {
                    self.storage.put(&self.versions.assets, &url, &response).await?;
                    report.cached.push(url);
                }
                Ok(response) => {
                    tracing::warn!("Pre-caching {} failed with status {}", url, response.status);
                    report.failed.push((url, format!("HTTP {}", response.status)));
                }
                Err(error) => {
                    tracing::warn!("Pre-caching {} failed: {}", url, error);
                    report.failed.push((url, error.to_string()));
                }
            }
        }

        report.purged = self.activate(host).await?;
        Ok(report)
    }

    /// Delete every namespace that is not current and claim open clients.
    pub async fn activate(&self, host: &impl ClientHost) -> Result<Vec<String>> {
        tracing::info!("Activating edge cache");
        let mut removed = Vec::new();
        for namespace in self.storage.namespaces().await? {
            if self.versions.is_current(&namespace) {
                continue;
            }
            if self.storage.delete_namespace(&namespace).await? {
                tracing::info!("Removed old cache {}", namespace);
                removed.push(namespace);
            }
        }

        self.purged.lock().await.extend(removed.iter().cloned());
        host.claim_clients().await?;
        Ok(removed)
    }

    /// Serve a request: network-first for API URLs, cache-first otherwise.
    pub async fn handle_fetch(&self, request: &EdgeRequest) -> Result<FetchOutcome> {
        if self.is_api_request(&request.url) {
            return self.network_first(request).await;
        }

        if request.is_get() {
            if let Some(response) = self.storage.match_any(&request.url).await? {
                return Ok(FetchOutcome {
                    response,
                    source: ResponseSource::Cache,
                });
            }
        }

        let response = self.fetcher.fetch(request).await?;
        Ok(FetchOutcome {
            response,
            source: ResponseSource::Network,
        })
    }

    async fn network_first(&self, request: &EdgeRequest) -> Result<FetchOutcome> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if request.is_get() && response.status == 200 {
                    if let Err(error) = self
                        .storage
                        .put(&self.versions.data, &request.url, &response)
                        .await
                    {
                        tracing::warn!("Failed to cache {}: {}", request.url, error);
                    }
                }
                Ok(FetchOutcome {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(error) if request.is_get() => {
                match self.storage.get(&self.versions.data, &request.url).await? {
                    Some(response) => {
                        tracing::debug!("Serving cached {} after: {}", request.url, error);
                        Ok(FetchOutcome {
                            response,
                            source: ResponseSource::Cache,
                        })
                    }
                    None => Err(error),
                }
            }
            Err(error) => Err(error),
        }
    }

    /// Show a notification built from a push payload.
    pub async fn handle_push(
        &self,
        payload: Option<&[u8]>,
        host: &impl ClientHost,
    ) -> Result<Notification> {
        tracing::info!("Push received");
        let notification = Notification::from_push_payload(payload);
        host.show_notification(&notification).await?;
        Ok(notification)
    }

    /// Close the clicked notification and bring the root view forward.
    pub async fn handle_notification_click(
        &self,
        notification: &Notification,
        host: &impl ClientHost,
    ) -> Result<()> {
        host.close_notification(notification).await?;
        host.focus_or_open(ROOT_VIEW).await
    }

    pub async fn namespace_state(&self, namespace: &str) -> Result<NamespaceState> {
        let exists = self
            .storage
            .namespaces()
            .await?
            .iter()
            .any(|name| name == namespace);

        if self.versions.is_current(namespace) {
            if exists && self.storage.entry_count(namespace).await? > 0 {
                return Ok(NamespaceState::Populated);
            }
            return Ok(NamespaceState::Empty);
        }
        if exists {
            return Ok(NamespaceState::Stale);
        }
        if self.purged.lock().await.contains(namespace) {
            return Ok(NamespaceState::Purged);
        }
        Ok(NamespaceState::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeFetcher {
        responses: StdMutex<HashMap<String, EdgeResponse>>,
        offline: StdMutex<bool>,
        calls: StdMutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn serve(&self, url: &str, body: &str) {
            self.responses.lock().unwrap().insert(
                url.to_string(),
                EdgeResponse::ok("text/plain", body.as_bytes().to_vec()),
            );
        }

        fn set_offline(&self, offline: bool) {
            *self.offline.lock().unwrap() = offline;
        }
    }

    impl Fetcher for FakeFetcher {
        async fn fetch(&self, request: &EdgeRequest) -> Result<EdgeResponse> {
            self.calls.lock().unwrap().push(request.url.clone());
            if *self.offline.lock().unwrap() {
                return Err(Error::Network("offline".into()));
            }
            Ok(self
                .responses
                .lock()
                .unwrap()
                .get(&request.url)
                .cloned()
                .unwrap_or(EdgeResponse {
                    status: 404,
                    headers: BTreeMap::new(),
                    body: Vec::new(),
                }))
        }
    }

    #[derive(Default)]
    struct RecordingHost {
        events: StdMutex<Vec<String>>,
    }

    impl ClientHost for RecordingHost {
        async fn show_notification(&self, notification: &Notification) -> Result<()> {
            self.events.lock().unwrap().push(format!("show:{}", notification.title));
            Ok(())
        }

        async fn close_notification(&self, notification: &Notification) -> Result<()> {
            self.events.lock().unwrap().push(format!("close:{}", notification.title));
            Ok(())
        }

        async fn claim_clients(&self) -> Result<()> {
            self.events.lock().unwrap().push("claim".into());
            Ok(())
        }

        async fn focus_or_open(&self, url: &str) -> Result<()> {
            self.events.lock().unwrap().push(format!("open:{url}"));
            Ok(())
        }
    }

    const API: &str = "https://story-api.example.com/v1/stories";

    fn config(manifest: &[&str]) -> EdgeCacheConfig {
        EdgeCacheConfig {
            origin: "https://app.example.com/".into(),
            asset_manifest: manifest.iter().map(ToString::to_string).collect(),
            ..EdgeCacheConfig::default()
        }
    }

    fn cache(manifest: &[&str]) -> EdgeCache<MemoryCacheStorage, FakeFetcher> {
        EdgeCache::new(MemoryCacheStorage::new(), FakeFetcher::default(), config(manifest)).unwrap()
    }

    #[test]
    fn test_resolve_manifest_entries() {
        let cache = cache(&[]);
        assert_eq!(cache.resolve("./"), "https://app.example.com/");
        assert_eq!(cache.resolve("./index.html"), "https://app.example.com/index.html");
        assert_eq!(cache.resolve("/favicon.png"), "https://app.example.com/favicon.png");
        assert_eq!(cache.resolve("https://cdn.example.com/a.js"), "https://cdn.example.com/a.js");
    }

    #[test]
    fn test_rejects_invalid_pattern_and_origin() {
        let bad_pattern = EdgeCacheConfig {
            api_pattern: "(".into(),
            ..EdgeCacheConfig::default()
        };
        assert!(EdgeCache::new(MemoryCacheStorage::new(), FakeFetcher::default(), bad_pattern).is_err());

        let bad_origin = EdgeCacheConfig {
            origin: "app.example.com".into(),
            ..EdgeCacheConfig::default()
        };
        assert!(EdgeCache::new(MemoryCacheStorage::new(), FakeFetcher::default(), bad_origin).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_install_precaches_and_activates() {
        let cache = cache(&["./", "./index.html", "./missing.js"]);
        cache.fetcher.serve("https://app.example.com/", "root");
        cache.fetcher.serve("https://app.example.com/index.html", "index");
        cache.storage().open("app-cache-v0").await.unwrap();
        let host = RecordingHost::default();

        let report = cache.install(&host).await.unwrap();

        assert_eq!(report.cached.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].1, "HTTP 404");
        assert_eq!(report.purged, vec!["app-cache-v0"]);
        assert_eq!(*host.events.lock().unwrap(), vec!["claim"]);
        assert_eq!(
            cache.namespace_state("app-cache-v1").await.unwrap(),
            NamespaceState::Populated
        );
        assert_eq!(
            cache.namespace_state("app-cache-v0").await.unwrap(),
            NamespaceState::Purged
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_assets_are_served_cache_first() {
        let cache = cache(&["./index.html"]);
        cache.fetcher.serve("https://app.example.com/index.html", "v1");
        cache.install(&RecordingHost::default()).await.unwrap();

        cache.fetcher.serve("https://app.example.com/index.html", "v2");
        cache.fetcher.set_offline(true);
        let outcome = cache
            .handle_fetch(&EdgeRequest::get("https://app.example.com/index.html"))
            .await
            .unwrap();

        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(outcome.response.body, b"v1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_uncached_asset_falls_through_to_network() {
        let cache = cache(&[]);
        cache.fetcher.serve("https://app.example.com/extra.css", "body{}");

        let outcome = cache
            .handle_fetch(&EdgeRequest::get("https://app.example.com/extra.css"))
            .await
            .unwrap();
        assert_eq!(outcome.source, ResponseSource::Network);

        cache.fetcher.set_offline(true);
        assert!(cache
            .handle_fetch(&EdgeRequest::get("https://app.example.com/other.css"))
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_api_falls_back_to_last_cached_response() {
        let cache = cache(&[]);
        cache.fetcher.serve(API, "[1]");

        let fresh = cache.handle_fetch(&EdgeRequest::get(API)).await.unwrap();
        assert_eq!(fresh.source, ResponseSource::Network);
        assert_eq!(cache.namespace_state("data-cache-v1").await.unwrap(), NamespaceState::Populated);

        cache.fetcher.set_offline(true);
        let cached = cache.handle_fetch(&EdgeRequest::get(API)).await.unwrap();
        assert_eq!(cached.source, ResponseSource::Cache);
        assert_eq!(cached.response.body, b"[1]");

        // No entry for a different URL: the network failure propagates.
        let err = cache
            .handle_fetch(&EdgeRequest::get(format!("{API}?page=2")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_api_is_network_first_and_skips_non_200() {
        let cache = cache(&[]);
        cache.fetcher.serve(API, "[1]");
        cache.handle_fetch(&EdgeRequest::get(API)).await.unwrap();

        cache.fetcher.serve(API, "[2]");
        let outcome = cache.handle_fetch(&EdgeRequest::get(API)).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Network);
        assert_eq!(outcome.response.body, b"[2]");

        cache.fetcher.responses.lock().unwrap().clear();
        let missing = cache.handle_fetch(&EdgeRequest::get(API)).await.unwrap();
        assert_eq!(missing.response.status, 404);
        let stored = cache.storage().get("data-cache-v1", API).await.unwrap().unwrap();
        assert_eq!(stored.body, b"[2]");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_api_writes_are_never_cached() {
        let cache = cache(&[]);
        cache.fetcher.serve(API, "created");
        let post = EdgeRequest {
            method: "POST".into(),
            ..EdgeRequest::get(API)
        };

        cache.handle_fetch(&post).await.unwrap();
        assert_eq!(cache.storage().entry_count("data-cache-v1").await.unwrap(), 0);

        cache.fetcher.set_offline(true);
        assert!(cache.handle_fetch(&post).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_version_bump_marks_old_namespace_stale_until_activation() {
        let storage = MemoryCacheStorage::new();
        storage
            .put("data-cache-v1", API, &EdgeResponse::ok("application/json", b"[]".to_vec()))
            .await
            .unwrap();
        let bumped = EdgeCacheConfig {
            versions: CacheVersions {
                assets: "app-cache-v1".into(),
                data: "data-cache-v2".into(),
            },
            ..config(&[])
        };
        let cache = EdgeCache::new(storage, FakeFetcher::default(), bumped).unwrap();

        assert_eq!(cache.namespace_state("data-cache-v1").await.unwrap(), NamespaceState::Stale);
        assert_eq!(cache.namespace_state("data-cache-v2").await.unwrap(), NamespaceState::Empty);

        let removed = cache.activate(&RecordingHost::default()).await.unwrap();
        assert_eq!(removed, vec!["data-cache-v1"]);
        assert_eq!(cache.namespace_state("data-cache-v1").await.unwrap(), NamespaceState::Purged);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_and_notification_click() {
        let cache = cache(&[]);
        let host = RecordingHost::default();

        let notification = cache
            .handle_push(Some(br#"{"title": "Hello"}"#), &host)
            .await
            .unwrap();
        assert_eq!(notification.body, DEFAULT_BODY);

        cache.handle_notification_click(&notification, &host).await.unwrap();
        assert_eq!(
            *host.events.lock().unwrap(),
            vec!["show:Hello", "close:Hello", "open:/"]
        );
    }
}
