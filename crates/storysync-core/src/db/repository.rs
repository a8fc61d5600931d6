//! Story repository implementations

use std::collections::BTreeMap;

use libsql::params::Params;
use libsql::{Connection, Value};
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::models::{GeoPoint, Photo, Story, StoryId};

/// Durable keyed storage for story records.
///
/// Every call is its own transaction; callers must not assume atomicity
/// across calls.
#[allow(async_fn_in_trait)]
pub trait StoryStore {
    /// Upsert by id. `created_at` of an existing record is never rewritten.
    async fn put(&self, story: &Story) -> Result<()>;

    /// All stored records, ordered by creation time then id
    async fn get_all(&self) -> Result<Vec<Story>>;

    /// Get a record by id
    async fn get_by_id(&self, id: &StoryId) -> Result<Option<Story>>;

    /// Physically delete a record. Sync calls this for superseded synced
    /// copies and, under the purge policy, for confirmed tombstones.
    async fn remove_local(&self, id: &StoryId) -> Result<bool>;
}

/// libSQL implementation of `StoryStore`
pub struct LibSqlStoryRepository<'a> {
    conn: &'a Connection,
}

const STORY_COLUMNS: &str = "id, description, lat, lon, photo_kind, photo_mime, photo_blob, \
                             photo_url, created_at, synced, deleted";

impl<'a> LibSqlStoryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Number of records with `synced = 0 AND deleted = 0`
    pub async fn count_pending(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM stories WHERE synced = 0 AND deleted = 0",
                (),
            )
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn parse_story(row: &libsql::Row) -> Result<Story> {
        let id: String = row.get(0)?;
        let description = optional_text(row.get_value(1)?);
        let location = GeoPoint::from_parts(
            optional_real(row.get_value(2)?),
            optional_real(row.get_value(3)?),
        );
        let photo = match optional_text(row.get_value(4)?).as_deref() {
            Some("pending") => {
                let mime_type = optional_text(row.get_value(5)?).unwrap_or_default();
                let bytes = match row.get_value(6)? {
                    Value::Blob(bytes) => bytes,
                    _ => Vec::new(),
                };
                Some(Photo::Pending { mime_type, bytes })
            }
            Some("remote") => optional_text(row.get_value(7)?).map(|url| Photo::Remote { url }),
            Some(other) => {
                return Err(Error::Database(format!("Unknown photo kind '{other}' for {id}")));
            }
            None => None,
        };

        Ok(Story {
            id: StoryId::from(id),
            description,
            location,
            photo,
            created_at: row.get(8)?,
            synced: row.get::<i32>(9)? != 0,
            deleted: row.get::<i32>(10)? != 0,
        })
    }
}

impl StoryStore for LibSqlStoryRepository<'_> {
    async fn put(&self, story: &Story) -> Result<()> {
        let (photo_kind, photo_mime, photo_blob, photo_url) = match &story.photo {
            Some(Photo::Pending { mime_type, bytes }) => (
                Value::Text("pending".to_string()),
                Value::Text(mime_type.clone()),
                Value::Blob(bytes.clone()),
                Value::Null,
            ),
            Some(Photo::Remote { url }) => (
                Value::Text("remote".to_string()),
                Value::Null,
                Value::Null,
                Value::Text(url.clone()),
            ),
            None => (Value::Null, Value::Null, Value::Null, Value::Null),
        };

        let params = Params::Positional(vec![
            Value::Text(story.id.to_string()),
            story.description.clone().map_or(Value::Null, Value::Text),
            story.location.map_or(Value::Null, |point| Value::Real(point.lat)),
            story.location.map_or(Value::Null, |point| Value::Real(point.lon)),
            photo_kind,
            photo_mime,
            photo_blob,
            photo_url,
            Value::Integer(story.created_at),
            Value::Integer(i64::from(story.synced)),
            Value::Integer(i64::from(story.deleted)),
        ]);

        self.conn
            .execute(
                "INSERT INTO stories (id, description, lat, lon, photo_kind, photo_mime, photo_blob,
                                      photo_url, created_at, synced, deleted)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     description = excluded.description,
                     lat = excluded.lat,
                     lon = excluded.lon,
                     photo_kind = excluded.photo_kind,
                     photo_mime = excluded.photo_mime,
                     photo_blob = excluded.photo_blob,
                     photo_url = excluded.photo_url,
                     synced = excluded.synced,
                     deleted = excluded.deleted",
                params,
            )
            .await?;
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Story>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {STORY_COLUMNS} FROM stories ORDER BY created_at ASC, id ASC"),
                (),
            )
            .await?;

        let mut stories = Vec::new();
        while let Some(row) = rows.next().await? {
            stories.push(Self::parse_story(&row)?);
        }
        Ok(stories)
    }

    async fn get_by_id(&self, id: &StoryId) -> Result<Option<Story>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {STORY_COLUMNS} FROM stories WHERE id = ?"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_story(&row)?)),
            None => Ok(None),
        }
    }

    async fn remove_local(&self, id: &StoryId) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM stories WHERE id = ?", [id.as_str()])
            .await?;
        Ok(removed > 0)
    }
}

fn optional_text(value: Value) -> Option<String> {
    match value {
        Value::Text(text) => Some(text),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn optional_real(value: Value) -> Option<f64> {
    match value {
        Value::Real(real) => Some(real),
        Value::Integer(integer) => Some(integer as f64),
        _ => None,
    }
}

/// In-memory `StoryStore`, for callers that do not need durability.
#[derive(Debug, Default)]
pub struct MemoryStoryStore {
    stories: RwLock<BTreeMap<StoryId, Story>>,
}

impl MemoryStoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records
    pub fn with_stories(stories: impl IntoIterator<Item = Story>) -> Self {
        Self {
            stories: RwLock::new(
                stories
                    .into_iter()
                    .map(|story| (story.id.clone(), story))
                    .collect(),
            ),
        }
    }
}

impl StoryStore for MemoryStoryStore {
    async fn put(&self, story: &Story) -> Result<()> {
        let mut stories = self.stories.write().await;
        let mut incoming = story.clone();
        if let Some(existing) = stories.get(&story.id) {
            incoming.created_at = existing.created_at;
        }
        stories.insert(incoming.id.clone(), incoming);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Story>> {
        let mut all = self.stories.read().await.values().cloned().collect::<Vec<_>>();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn get_by_id(&self, id: &StoryId) -> Result<Option<Story>> {
        Ok(self.stories.read().await.get(id).cloned())
    }

    async fn remove_local(&self, id: &StoryId) -> Result<bool> {
        Ok(self.stories.write().await.remove(id).is_some())
    }
}
