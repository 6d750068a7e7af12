use anyhow::Result;
use parking_lot::Mutex;

use super::VideoRepository;
use crate::reaction::ReactionKind;
use crate::video::{NewVideo, ReactionCounts, VideoRecord, generate_video_id};

/// Process-local store used by the demo server and by tests.
///
/// Records keep insertion order. The mutex covers the whole read-check-write
/// of a reaction, so concurrent requests cannot lose updates.
#[derive(Debug, Default)]
pub struct MemoryStore {
    videos: Mutex<Vec<VideoRecord>>,
}

impl MemoryStore {
    pub fn new(videos: Vec<VideoRecord>) -> Self {
        Self {
            videos: Mutex::new(videos),
        }
    }
}

impl VideoRepository for MemoryStore {
    fn find(&self, id: &str) -> Result<Option<VideoRecord>> {
        Ok(self.videos.lock().iter().find(|video| video.id == id).cloned())
    }

    fn list(&self) -> Result<Vec<VideoRecord>> {
        Ok(self.videos.lock().clone())
    }

    fn insert(&self, video: NewVideo) -> Result<VideoRecord> {
        let mut videos = self.videos.lock();
        let mut id = generate_video_id();
        while videos.iter().any(|existing| existing.id == id) {
            id = generate_video_id();
        }
        let record = video.into_record(id);
        videos.push(record.clone());
        Ok(record)
    }

    fn adjust_counter(
        &self,
        id: &str,
        kind: ReactionKind,
        delta: i64,
    ) -> Result<Option<ReactionCounts>> {
        let mut videos = self.videos.lock();
        let Some(video) = videos.iter_mut().find(|video| video.id == id) else {
            return Ok(None);
        };

        let counter = match kind {
            ReactionKind::Like => &mut video.likes,
            ReactionKind::Dislike => &mut video.dislikes,
        };
        *counter = (*counter + delta).max(0);

        Ok(Some(video.reactions()))
    }
}
