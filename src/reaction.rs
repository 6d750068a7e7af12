//! Like/dislike counter updates.
//!
//! Clients toggle one reaction at a time. Switching from "liked" to
//! "disliked" is two calls from the client; the updater never flips the
//! complementary counter on its own.

use std::{fmt, str::FromStr, sync::Arc};

use serde::Deserialize;

use crate::error::{VideoError, VideoResult};
use crate::store::VideoRepository;
use crate::video::ReactionCounts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl FromStr for ReactionKind {
    type Err = VideoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            _ => Err(VideoError::invalid("Invalid reaction type")),
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        })
    }
}

/// Body of `POST /api/videos/{id}/reaction`. Both fields are required.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub remove: bool,
}

#[derive(Clone)]
pub struct ReactionUpdater {
    store: Arc<dyn VideoRepository>,
}

impl ReactionUpdater {
    pub fn new(store: Arc<dyn VideoRepository>) -> Self {
        Self { store }
    }

    /// Adds one reaction, or takes one away when `remove` is set. The kind is
    /// validated before the store is touched.
    pub fn apply(&self, id: &str, kind: &str, remove: bool) -> VideoResult<ReactionCounts> {
        let kind: ReactionKind = kind.parse()?;
        let delta = if remove { -1 } else { 1 };

        let counts = self
            .store
            .adjust_counter(id, kind, delta)?
            .ok_or(VideoError::NotFound)?;
        tracing::debug!(
            video = id,
            %kind,
            remove,
            likes = counts.likes,
            dislikes = counts.dislikes,
            "reaction applied"
        );
        Ok(counts)
    }
}
