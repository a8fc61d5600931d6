//! Story model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::photo::Photo;
use crate::error::Error;

/// Identifier of a story record.
///
/// Records created offline get a client-generated, time-sortable id (UUID v7).
/// Records pulled from the remote service keep the server-assigned id verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(String);

impl StoryId {
    /// Generate a new client-side id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Borrow the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StoryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Story id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for StoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StoryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A latitude/longitude pair. Stories carry both coordinates or neither.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Build a point, rejecting out-of-range or non-finite coordinates
    pub fn new(lat: f64, lon: f64) -> crate::Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidInput(format!("Latitude out of range: {lat}")));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidInput(format!("Longitude out of range: {lon}")));
        }
        Ok(Self { lat, lon })
    }

    /// Combine two optional coordinates; a lone coordinate means no location.
    #[must_use]
    pub const fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        match (lat, lon) {
            (Some(lat), Some(lon)) => Some(Self { lat, lon }),
            _ => None,
        }
    }
}

/// User input for a new story.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryDraft {
    pub description: Option<String>,
    pub location: Option<GeoPoint>,
    pub photo: Option<Photo>,
}

/// A story record, the unit of persistence and sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    /// Unique identifier within the local store
    pub id: StoryId,
    /// Free text
    pub description: Option<String>,
    /// Optional geotag
    pub location: Option<GeoPoint>,
    /// Pending payload or remote URL
    pub photo: Option<Photo>,
    /// Creation timestamp (Unix ms), immutable
    pub created_at: i64,
    /// Whether the current revision reached the remote service
    pub synced: bool,
    /// Tombstone flag
    pub deleted: bool,
}

impl Story {
    /// Create an unsynced story from a draft with a fresh client id.
    #[must_use]
    pub fn from_draft(draft: StoryDraft) -> Self {
        Self {
            id: StoryId::generate(),
            description: draft.description,
            location: draft.location,
            photo: draft.photo,
            created_at: crate::util::now_millis(),
            synced: false,
            deleted: false,
        }
    }

    /// A tombstone for an id the local store has never seen.
    #[must_use]
    pub fn tombstone(id: StoryId) -> Self {
        Self {
            id,
            description: None,
            location: None,
            photo: None,
            created_at: crate::util::now_millis(),
            synced: true,
            deleted: true,
        }
    }

    /// Still waiting to be pushed to the remote service
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.synced && !self.deleted
    }

    /// Eligible for display
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        !self.deleted
    }

    /// Description or an empty string, as submitted to the remote service
    #[must_use]
    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}
