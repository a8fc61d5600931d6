//! Data models for storysync

mod photo;
mod story;

pub use photo::{is_image_mime, upload_file_name, Photo};
pub use story::{GeoPoint, Story, StoryDraft, StoryId};
