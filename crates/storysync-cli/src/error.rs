use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] storysync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No story description provided")]
    EmptyDescription,
    #[error("Story ID cannot be empty")]
    EmptyStoryId,
    #[error("Both --lat and --lon are required for a location")]
    IncompleteLocation,
    #[error("Unsupported photo type '{0}'; attach an image file")]
    UnsupportedPhoto(String),
    #[error("No API token configured. Set STORYSYNC_TOKEN or add \"token\" to {0}")]
    MissingToken(String),
    #[error("The story service rejected the token ({0}). Update STORYSYNC_TOKEN and retry.")]
    ReauthRequired(String),
    #[error("Local story database failed ({0}). Check --db-path or STORYSYNC_DB_PATH.")]
    LocalStore(String),
}

impl CliError {
    /// Turn credential rejections and local store failures into hints.
    pub fn from_core(error: storysync_core::Error) -> Self {
        match error {
            storysync_core::Error::Auth(message) => Self::ReauthRequired(message),
            other if other.is_storage() => Self::LocalStore(other.to_string()),
            other => Self::Core(other),
        }
    }
}
