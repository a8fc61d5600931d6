//! Photo payload model

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Photo attached to a story.
///
/// Pending photos carry the encoded image until the story is pushed; stories
/// pulled from the remote service only reference the resolved URL.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Photo {
    Pending { mime_type: String, bytes: Vec<u8> },
    Remote { url: String },
}

impl fmt::Debug for Photo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending { mime_type, bytes } => f
                .debug_struct("Pending")
                .field("mime_type", mime_type)
                .field("len", &bytes.len())
                .finish(),
            Self::Remote { url } => f.debug_struct("Remote").field("url", url).finish(),
        }
    }
}

impl Photo {
    /// Wrap raw image bytes as a pending upload.
    pub fn pending(mime_type: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let mime_type = mime_type.into().trim().to_ascii_lowercase();
        if mime_type.is_empty() {
            return Err(Error::InvalidInput("Photo MIME type cannot be empty".into()));
        }
        if bytes.is_empty() {
            return Err(Error::InvalidInput("Photo payload cannot be empty".into()));
        }
        Ok(Self::Pending { mime_type, bytes })
    }

    /// Parse a `data:<mime>;base64,<payload>` URL into a pending photo.
    pub fn from_data_url(data_url: &str) -> Result<Self> {
        let rest = data_url
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| Error::InvalidInput("Photo data URL must start with data:".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::InvalidInput("Photo data URL has no payload".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| Error::InvalidInput("Photo data URL must be base64 encoded".into()))?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|error| Error::InvalidInput(format!("Invalid base64 photo payload: {error}")))?;
        Self::pending(mime_type, bytes)
    }

    /// Size of the pending payload in bytes (0 for remote photos).
    pub fn size(&self) -> usize {
        match self {
            Self::Pending { bytes, .. } => bytes.len(),
            Self::Remote { .. } => 0,
        }
    }

    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Self::Pending { mime_type, .. } => Some(mime_type),
            Self::Remote { .. } => None,
        }
    }

    pub fn remote_url(&self) -> Option<&str> {
        match self {
            Self::Remote { url } => Some(url),
            Self::Pending { .. } => None,
        }
    }

    /// Whether the payload is tagged as an image.
    pub fn is_image(&self) -> bool {
        self.mime_type().is_some_and(is_image_mime)
    }
}

/// `image/*` check used before a payload is attached to an upload.
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

/// File name sent with the multipart photo part.
pub fn upload_file_name(mime_type: &str) -> String {
    let extension = match mime_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    };
    format!("photo.{extension}")
}
