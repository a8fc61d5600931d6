//! Database layer for storysync

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{LibSqlStoryRepository, MemoryStoryStore, StoryStore};
