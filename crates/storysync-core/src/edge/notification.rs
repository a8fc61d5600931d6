//! Push notifications raised by the edge cache.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::util::normalize_text_option;

pub const DEFAULT_TITLE: &str = "New Notification";
pub const DEFAULT_BODY: &str = "You have a new message.";
pub const NOTIFICATION_ICON: &str = "/favicon.png";

/// A notification ready to be shown by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            body: DEFAULT_BODY.to_string(),
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_ICON.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PushPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

impl Notification {
    /// Build a notification from a raw push payload.
    ///
    /// Missing or blank fields use the defaults. A payload that is not a JSON
    /// object yields the default notification.
    pub fn from_push_payload(payload: Option<&[u8]>) -> Self {
        let parsed = match payload {
            Some(bytes) => serde_json::from_slice::<PushPayload>(bytes).unwrap_or_else(|error| {
                tracing::warn!("Ignoring malformed push payload: {}", error);
                PushPayload::default()
            }),
            None => PushPayload::default(),
        };

        let defaults = Self::default();
        Self {
            title: normalize_text_option(parsed.title).unwrap_or(defaults.title),
            body: normalize_text_option(parsed.body).unwrap_or(defaults.body),
            ..defaults
        }
    }
}

/// The environment hosting the edge cache: notification display and client windows.
#[allow(async_fn_in_trait)]
pub trait ClientHost {
    async fn show_notification(&self, notification: &Notification) -> Result<()>;

    async fn close_notification(&self, notification: &Notification) -> Result<()>;

    /// Take control of already-open clients after activation.
    async fn claim_clients(&self) -> Result<()>;

    /// Focus an open client showing `url`, or open a new one.
    async fn focus_or_open(&self, url: &str) -> Result<()>;
}
