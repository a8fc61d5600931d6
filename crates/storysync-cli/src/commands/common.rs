use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use storysync_core::db::{Database, LibSqlStoryRepository};
use storysync_core::models::is_image_mime;
use storysync_core::sync::SyncOptions;
use storysync_core::{
    Credential, GeoPoint, Photo, Story, StoryApiClient, StoryDraft, StorysyncConfig,
    SyncCoordinator, SyncReport,
};

use crate::cli::StoryArgs;
use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "config.json";
const DATABASE_FILE_NAME: &str = "stories.db";

/// Resolved configuration and paths shared by every command.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config: StorysyncConfig,
    pub config_path: PathBuf,
    pub db_path: PathBuf,
}

impl CliContext {
    /// Load the config file, apply environment overrides and resolve paths.
    pub fn load(
        cli_config_path: Option<PathBuf>,
        cli_db_path: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        let config_path = cli_config_path.unwrap_or_else(default_config_path);
        let mut config = StorysyncConfig::load_from_path(&config_path)?;
        config.apply_env()?;
        let db_path = resolve_db_path(cli_db_path, &config);
        Ok(Self {
            config,
            config_path,
            db_path,
        })
    }

    pub fn credential(&self) -> Result<Credential, CliError> {
        self.config
            .credential()
            .ok_or_else(|| CliError::MissingToken(self.config_path.display().to_string()))
    }

    pub fn api_client(&self) -> Result<StoryApiClient, CliError> {
        Ok(StoryApiClient::new(
            self.config.api_base_url.clone(),
            self.config.request_timeout(),
        )?)
    }

    pub async fn open_database(&self) -> Result<Database, CliError> {
        Database::open(&self.db_path)
            .await
            .map_err(CliError::from_core)
    }

    pub fn coordinator<'a>(
        &self,
        db: &'a Database,
        options: SyncOptions,
    ) -> Result<SyncCoordinator<LibSqlStoryRepository<'a>, StoryApiClient>, CliError> {
        Ok(SyncCoordinator::with_options(
            LibSqlStoryRepository::new(db.connection()),
            self.api_client()?,
            options,
        ))
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storysync")
        .join(CONFIG_FILE_NAME)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storysync")
        .join(DATABASE_FILE_NAME)
}

/// `--db-path` wins over the configured path, which wins over the data dir.
pub fn resolve_db_path(cli_db_path: Option<PathBuf>, config: &StorysyncConfig) -> PathBuf {
    cli_db_path
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(default_db_path)
}

pub fn normalize_story_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyStoryId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Build a draft from command-line arguments, reading the photo file if given.
pub fn build_draft(args: &StoryArgs) -> Result<StoryDraft, CliError> {
    let description = args.description.join(" ").trim().to_string();
    if description.is_empty() {
        return Err(CliError::EmptyDescription);
    }

    let location = match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
        (None, None) => None,
        _ => return Err(CliError::IncompleteLocation),
    };

    let photo = args.photo.as_deref().map(read_photo).transpose()?;

    Ok(StoryDraft {
        description: Some(description),
        location,
        photo,
    })
}

/// Read an image file, or decode `path` itself when it is a base64 `data:` URL.
pub fn read_photo(path: &Path) -> Result<Photo, CliError> {
    if let Some(data_url) = path.to_str().filter(|raw| raw.starts_with("data:")) {
        let photo = Photo::from_data_url(data_url)?;
        if !photo.is_image() {
            let mime_type = photo.mime_type().unwrap_or_default().to_string();
            return Err(CliError::UnsupportedPhoto(mime_type));
        }
        return Ok(photo);
    }

    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    if !is_image_mime(&mime_type) {
        return Err(CliError::UnsupportedPhoto(mime_type));
    }
    let bytes = std::fs::read(path)?;
    Ok(Photo::pending(mime_type, bytes)?)
}

#[derive(Debug, Serialize)]
pub struct StoryListItem {
    pub id: String,
    pub description: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub photo: Option<String>,
    pub created_at: i64,
    pub created_at_iso: String,
    pub relative_time: String,
    pub synced: bool,
}

pub fn story_to_list_item(story: &Story) -> StoryListItem {
    let now_ms = Utc::now().timestamp_millis();
    StoryListItem {
        id: story.id.to_string(),
        description: story.description_or_empty().to_string(),
        lat: story.location.map(|point| point.lat),
        lon: story.location.map(|point| point.lon),
        photo: story.photo.as_ref().map(describe_photo),
        created_at: story.created_at,
        created_at_iso: format_timestamp(story.created_at),
        relative_time: format_relative_time(story.created_at, now_ms),
        synced: story.synced,
    }
}

fn describe_photo(photo: &Photo) -> String {
    match photo {
        Photo::Remote { url } => url.clone(),
        Photo::Pending { mime_type, .. } => format!("pending {mime_type}, {} bytes", photo.size()),
    }
}

pub fn format_story_lines(stories: &[Story]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    stories
        .iter()
        .map(|story| {
            let id = story.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let status = if story.synced { "synced" } else { "pending" };
            let preview = story_preview(story, 40);
            let relative_time = format_relative_time(story.created_at, now_ms);
            match story.location {
                Some(point) => format!(
                    "{short_id:<13}  {status:<7}  {preview:<40}  {relative_time:<10}  ({:.4}, {:.4})",
                    point.lat, point.lon
                ),
                None => format!("{short_id:<13}  {status:<7}  {preview:<40}  {relative_time}"),
            }
        })
        .collect()
}

pub fn story_preview(story: &Story, max_chars: usize) -> String {
    let first_line = story.description_or_empty().lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_sync_report_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Sync completed: {} visible, {} pushed, {} still pending",
        report.visible.len(),
        report.pushed.len(),
        report.failed.len()
    )];
    for failure in &report.failed {
        lines.push(format!("  not pushed {}: {}", failure.id, failure.error));
    }
    for id in &report.dropped_photos {
        lines.push(format!("  photo dropped for {id} (could not be resized)"));
    }
    for id in &report.purged {
        lines.push(format!("  purged tombstone {id}"));
    }
    if !report.superseded.is_empty() {
        lines.push(format!(
            "  dropped {} local copies the story service no longer lists",
            report.superseded.len()
        ));
    }
    lines
}

pub fn format_list_footer(shown: usize, pending: u64) -> String {
    let noun = if shown == 1 { "story" } else { "stories" };
    format!("{shown} {noun}, {pending} waiting to sync")
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < year {
        format!("{}w ago", diff / week)
    } else {
        format!("{}y ago", diff / year)
    }
}
