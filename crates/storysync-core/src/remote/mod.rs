//! Remote story service client.
//!
//! Thin wrapper over the story HTTP contract (`GET /stories`,
//! `POST /stories`, `DELETE /stories/{id}`). The bearer credential is passed
//! in on every call; the client never reads ambient state.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{upload_file_name, GeoPoint, Photo, Story, StoryId};
use crate::util::{compact_text, normalize_base_url, normalize_text_option};

/// Opaque bearer token supplied by the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        normalize_text_option(Some(token.into()))
            .map(Self)
            .ok_or_else(|| Error::InvalidInput("Credential token must not be empty".into()))
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("Credential")
            .field(&"[REDACTED]")
            .finish()
    }
}

/// Image bytes attached to a create request.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadPhoto {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for UploadPhoto {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("UploadPhoto")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Multipart payload of `POST /stories`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryUpload {
    pub description: String,
    pub location: Option<GeoPoint>,
    pub photo: Option<UploadPhoto>,
}

/// The remote story service contract.
#[allow(async_fn_in_trait)]
pub trait StoryService {
    /// Server-canonical records, already marked synced and never tombstoned.
    async fn list_stories(&self, credential: &Credential) -> Result<Vec<Story>>;

    async fn create_story(&self, credential: &Credential, upload: &StoryUpload) -> Result<()>;

    async fn delete_story(&self, credential: &Credential, id: &StoryId) -> Result<()>;
}

/// HTTP client for the story service.
#[derive(Debug, Clone)]
pub struct StoryApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl StoryApiClient {
    /// Builds a client for an explicit API base URL (e.g. `https://host/v1`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(&base_url.into()).map_err(Error::InvalidInput)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::InvalidInput(format!("Failed to construct HTTP client: {error}")))?;
        Ok(Self { base_url, client })
    }

    /// Returns the base URL this client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn stories_url(&self) -> String {
        format!("{}/stories", self.base_url)
    }
}

impl StoryService for StoryApiClient {
    async fn list_stories(&self, credential: &Credential) -> Result<Vec<Story>> {
        let response = self
            .client
            .get(self.stories_url())
            .bearer_auth(credential.token())
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body = response.text().await?;
        parse_story_list(&body)
    }

    async fn create_story(&self, credential: &Credential, upload: &StoryUpload) -> Result<()> {
        let mut form =
            reqwest::multipart::Form::new().text("description", upload.description.clone());
        if let Some(point) = upload.location {
            form = form
                .text("lat", point.lat.to_string())
                .text("lon", point.lon.to_string());
        }
        if let Some(photo) = &upload.photo {
            let part = reqwest::multipart::Part::bytes(photo.bytes.clone())
                .file_name(upload_file_name(&photo.mime_type))
                .mime_str(&photo.mime_type)
                .map_err(|error| {
                    Error::InvalidInput(format!("Invalid photo MIME type: {error}"))
                })?;
            form = form.part("photo", part);
        }

        let response = self
            .client
            .post(self.stories_url())
            .bearer_auth(credential.token())
            .multipart(form)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_story(&self, credential: &Credential, id: &StoryId) -> Result<()> {
        let url = format!(
            "{}/{}",
            self.stories_url(),
            urlencoding::encode(id.as_str())
        );
        let response = self
            .client
            .delete(url)
            .bearer_auth(credential.token())
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status, &body))
}

/// Map a non-success status to the error taxonomy.
pub fn classify_failure(status: StatusCode, body: &str) -> Error {
    let message = parse_api_error(status, body);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Error::Auth(message)
    } else {
        Error::Server {
            status: status.as_u16(),
            body: message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<serde_json::Value>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        let message = payload.message.or_else(|| match payload.error {
            Some(serde_json::Value::String(text)) => Some(text),
            _ => None,
        });
        if let Some(message) = message {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<RemoteStory>),
    Envelope {
        #[serde(rename = "listStory")]
        list_story: Vec<RemoteStory>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteStory {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    created_at: Option<serde_json::Value>,
}

impl From<RemoteStory> for Story {
    fn from(remote: RemoteStory) -> Self {
        Self {
            id: StoryId::from(remote.id),
            description: remote.description,
            location: GeoPoint::from_parts(remote.lat, remote.lon),
            photo: normalize_text_option(remote.photo_url).map(|url| Photo::Remote { url }),
            created_at: remote.created_at.as_ref().map_or(0, parse_created_at),
            synced: true,
            deleted: false,
        }
    }
}

fn parse_created_at(value: &serde_json::Value) -> i64 {
    match value {
        serde_json::Value::Number(number) => number.as_i64().unwrap_or_default(),
        serde_json::Value::String(text) => chrono::DateTime::parse_from_rfc3339(text.trim())
            .map_or(0, |date_time| date_time.timestamp_millis()),
        _ => 0,
    }
}

/// Parse a `GET /stories` body, either a bare array or the `listStory` envelope.
///
/// Public for testability: callers can exercise parsing without network access.
pub fn parse_story_list(body: &str) -> Result<Vec<Story>> {
    let parsed: ListResponse = serde_json::from_str(body)?;
    let stories = match parsed {
        ListResponse::Bare(stories) | ListResponse::Envelope { list_story: stories } => stories,
    };
    Ok(stories.into_iter().map(Story::from).collect())
}
