//! storysync-core - Core library for storysync
//!
//! This crate contains the story models, the local record store, the remote
//! story service client, photo preprocessing, the offline-first sync
//! coordinator and the edge cache used by the `storysync` CLI.

pub mod config;
pub mod db;
pub mod edge;
pub mod error;
pub mod media;
pub mod models;
pub mod remote;
pub mod sync;
pub mod util;

pub use config::StorysyncConfig;
pub use error::{Error, Result};
pub use models::{GeoPoint, Photo, Story, StoryDraft, StoryId};
pub use remote::{Credential, StoryApiClient, StoryService};
pub use sync::{SubmitOutcome, SyncCoordinator, SyncOptions, SyncReport, TombstonePolicy};
