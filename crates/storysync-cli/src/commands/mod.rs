pub mod add;
pub mod cache;
pub mod common;
pub mod completions;
pub mod delete;
pub mod list;
pub mod purge;
pub mod push;
pub mod submit;
pub mod sync;
