//! Storage backends for video records.
//!
//! Every backend is synchronous; the HTTP layer drives them from the blocking
//! pool. Errors are plain `anyhow` errors and are mapped to an upstream
//! failure by the callers.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;

use crate::reaction::ReactionKind;
use crate::video::{NewVideo, ReactionCounts, VideoRecord};

pub trait VideoRepository: Send + Sync {
    /// Whether `id` can name a record in this store at all. Lookups for ids
    /// that fail this check are skipped.
    fn accepts_key(&self, _id: &str) -> bool {
        true
    }

    fn find(&self, id: &str) -> Result<Option<VideoRecord>>;

    /// All records in store-iteration order.
    fn list(&self) -> Result<Vec<VideoRecord>>;

    /// Persists `video` under a newly assigned id and returns the stored row.
    fn insert(&self, video: NewVideo) -> Result<VideoRecord>;

    /// Adds `delta` to one counter, never letting it drop below zero.
    /// Returns `None` when no record matches `id`.
    fn adjust_counter(
        &self,
        id: &str,
        kind: ReactionKind,
        delta: i64,
    ) -> Result<Option<ReactionCounts>>;
}
