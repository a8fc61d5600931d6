//! Runtime configuration.
//!
//! `StorysyncConfig` is read from a JSON file (every field optional) and then
//! overridden by `STORYSYNC_*` environment variables.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::edge::{CacheVersions, EdgeCacheConfig, DEFAULT_ASSET_MANIFEST};
use crate::error::{Error, Result};
use crate::media::{ResizeOptions, UPLOAD_SIZE_THRESHOLD};
use crate::remote::Credential;
use crate::sync::{SyncOptions, TombstonePolicy};
use crate::util::{normalize_base_url, normalize_text_option};

pub const DEFAULT_API_BASE_URL: &str = "https://story-api.dicoding.dev/v1";
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_BASE_URL: &str = "STORYSYNC_API_BASE_URL";
pub const ENV_TOKEN: &str = "STORYSYNC_TOKEN";
pub const ENV_DB_PATH: &str = "STORYSYNC_DB_PATH";
pub const ENV_APP_ORIGIN: &str = "STORYSYNC_APP_ORIGIN";
pub const ENV_TIMEOUT_SECS: &str = "STORYSYNC_TIMEOUT_SECS";
pub const ENV_PURGE_TOMBSTONES: &str = "STORYSYNC_PURGE_TOMBSTONES";

#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StorysyncConfig {
    pub api_base_url: String,
    /// Bearer token for the story service. Never printed.
    pub token: Option<String>,
    /// Local database file; the CLI picks a data-dir path when unset.
    pub database_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub upload_threshold_bytes: usize,
    pub max_photo_width: u32,
    pub max_photo_height: u32,
    pub photo_quality: f32,
    pub purge_confirmed_tombstones: bool,
    pub edge: EdgeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EdgeSettings {
    pub asset_cache: String,
    pub data_cache: String,
    pub api_pattern: String,
    pub app_origin: String,
    pub asset_manifest: Vec<String>,
}

impl Default for StorysyncConfig {
    fn default() -> Self {
        let resize = ResizeOptions::default();
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token: None,
            database_path: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            upload_threshold_bytes: UPLOAD_SIZE_THRESHOLD,
            max_photo_width: resize.max_width,
            max_photo_height: resize.max_height,
            photo_quality: resize.quality,
            purge_confirmed_tombstones: false,
            edge: EdgeSettings::default(),
        }
    }
}

impl Default for EdgeSettings {
    fn default() -> Self {
        let versions = CacheVersions::default();
        Self {
            asset_cache: versions.assets,
            data_cache: versions.data,
            api_pattern: "/stories".to_string(),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            asset_manifest: DEFAULT_ASSET_MANIFEST.iter().map(ToString::to_string).collect(),
        }
    }
}

impl fmt::Debug for StorysyncConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StorysyncConfig")
            .field("api_base_url", &self.api_base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("database_path", &self.database_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("upload_threshold_bytes", &self.upload_threshold_bytes)
            .field("max_photo_width", &self.max_photo_width)
            .field("max_photo_height", &self.max_photo_height)
            .field("photo_quality", &self.photo_quality)
            .field("purge_confirmed_tombstones", &self.purge_confirmed_tombstones)
            .field("edge", &self.edge)
            .finish()
    }
}

impl StorysyncConfig {
    /// Load from a JSON file, falling back to defaults when it does not exist.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw).map_err(|error| {
            Error::InvalidInput(format!("Failed to parse config at {}: {error}", path.display()))
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config = serde_json::from_str::<Self>(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply `STORYSYNC_*` overrides from an arbitrary lookup.
    ///
    /// Public for testability: callers can exercise overrides without touching
    /// the process environment.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let read = |name: &str| normalize_text_option(lookup(name));

        if let Some(url) = read(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(token) = read(ENV_TOKEN) {
            self.token = Some(token);
        }
        if let Some(path) = read(ENV_DB_PATH) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(origin) = read(ENV_APP_ORIGIN) {
            self.edge.app_origin = origin;
        }
        if let Some(secs) = read(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = secs.parse().map_err(|_| {
                Error::InvalidInput(format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds"))
            })?;
        }
        if let Some(flag) = read(ENV_PURGE_TOMBSTONES) {
            self.purge_confirmed_tombstones = matches!(
                flag.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        normalize_base_url(&self.api_base_url).map_err(Error::InvalidInput)?;
        normalize_base_url(&self.edge.app_origin)
            .map_err(|error| Error::InvalidInput(format!("app origin: {error}")))?;
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput("Request timeout must be positive".into()));
        }
        if !(self.photo_quality > 0.0 && self.photo_quality <= 1.0) {
            return Err(Error::InvalidInput(
                "Photo quality must be within (0.0, 1.0]".into(),
            ));
        }
        if self.max_photo_width == 0 || self.max_photo_height == 0 {
            return Err(Error::InvalidInput("Photo bounds must be positive".into()));
        }
        if self.edge.asset_cache == self.edge.data_cache {
            return Err(Error::InvalidInput(
                "Asset and data cache names must differ".into(),
            ));
        }
        Ok(())
    }

    pub fn credential(&self) -> Option<Credential> {
        self.token
            .as_deref()
            .and_then(|token| Credential::new(token).ok())
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            upload_threshold: self.upload_threshold_bytes,
            resize: ResizeOptions {
                max_width: self.max_photo_width,
                max_height: self.max_photo_height,
                quality: self.photo_quality,
            },
            tombstones: if self.purge_confirmed_tombstones {
                TombstonePolicy::PurgeConfirmed
            } else {
                TombstonePolicy::Retain
            },
        }
    }

    pub fn edge_config(&self) -> EdgeCacheConfig {
        EdgeCacheConfig {
            versions: CacheVersions {
                assets: self.edge.asset_cache.clone(),
                data: self.edge.data_cache.clone(),
            },
            api_pattern: self.edge.api_pattern.clone(),
            origin: self.edge.app_origin.clone(),
            asset_manifest: self.edge.asset_manifest.clone(),
        }
    }
}
