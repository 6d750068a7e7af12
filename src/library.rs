//! Read and create operations over the configured store.

use std::sync::Arc;

use crate::error::{VideoError, VideoResult};
use crate::store::VideoRepository;
use crate::upload::{MediaFile, MediaUploader};
use crate::video::{NewVideo, SuggestedVideo, VideoRecord};

/// Front door for video lookups and uploads.
///
/// Lookups are two-tier: the primary store first, then an optional static
/// fallback catalog. Fallback records are read-only, so reactions on them
/// report `NotFound` even though a lookup succeeds. Creation needs a media
/// uploader; without one the library is read-only.
#[derive(Clone)]
pub struct VideoLibrary {
    store: Arc<dyn VideoRepository>,
    fallback: Arc<[VideoRecord]>,
    uploader: Option<Arc<dyn MediaUploader>>,
}

/// Fields of an upload request before validation.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video: Option<MediaFile>,
}

impl VideoLibrary {
    pub fn new(store: Arc<dyn VideoRepository>) -> Self {
        Self {
            store,
            fallback: Arc::from(Vec::new()),
            uploader: None,
        }
    }

    pub fn with_fallback(mut self, records: Vec<VideoRecord>) -> Self {
        self.fallback = records.into();
        self
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn MediaUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn store(&self) -> Arc<dyn VideoRepository> {
        self.store.clone()
    }

    /// Whether uploads (and the full listing that goes with them) are enabled.
    pub fn accepts_uploads(&self) -> bool {
        self.uploader.is_some()
    }

    pub fn get_by_id(&self, id: &str) -> VideoResult<VideoRecord> {
        if let Some(record) = self.find_primary(id) {
            return Ok(record);
        }

        let record = self
            .fallback
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or(VideoError::NotFound)?;
        tracing::info!(video = id, "served video from fallback catalog");
        Ok(record)
    }

    /// Primary-store tier of the lookup. Malformed keys skip the store, and
    /// store errors count as a miss so the fallback still gets a chance.
    fn find_primary(&self, id: &str) -> Option<VideoRecord> {
        if !self.store.accepts_key(id) {
            tracing::debug!(video = id, "id is not a store key");
            return None;
        }
        match self.store.find(id) {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(video = id, error = %format!("{err:#}"), "video lookup failed");
                None
            }
        }
    }

    pub fn list_suggested(&self) -> VideoResult<Vec<SuggestedVideo>> {
        let records = self.store.list()?;
        Ok(records.iter().map(SuggestedVideo::from).collect())
    }

    pub fn list_all(&self) -> VideoResult<Vec<VideoRecord>> {
        Ok(self.store.list()?)
    }

    /// Uploads the media file, then stores a new record pointing at it. An
    /// upload failure aborts before anything is written.
    pub fn create(&self, form: UploadForm) -> VideoResult<VideoRecord> {
        let (title, description, video) = match form {
            UploadForm {
                title: Some(title),
                description: Some(description),
                video: Some(video),
            } if !title.trim().is_empty()
                && !description.trim().is_empty()
                && !video.bytes.is_empty() =>
            {
                (title, description, video)
            }
            _ => return Err(VideoError::invalid("Missing title, description, or video file")),
        };

        let uploader = self
            .uploader
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no media uploader configured"))?;
        let uploaded = uploader.upload(&video)?;

        let record = self.store.insert(NewVideo {
            title,
            description,
            src: uploaded.url,
            public_id: uploaded.public_id,
        })?;
        tracing::info!(video = %record.id, src = %record.src, "stored uploaded video");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaction::ReactionKind;
    use crate::store::{MemoryStore, SqliteStore};
    use crate::upload::UploadedMedia;
    use crate::video::{NewVideo, ReactionCounts, demo_catalog, fallback_catalog, is_store_key};
    use anyhow::{Result, anyhow};
    use axum::body::Bytes;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    /// Records every upload and hands back a predictable URL.
    #[derive(Default)]
    struct RecordingUploader {
        uploads: Mutex<Vec<usize>>,
    }

    impl MediaUploader for RecordingUploader {
        fn upload(&self, media: &MediaFile) -> Result<UploadedMedia> {
            let mut uploads = self.uploads.lock();
            uploads.push(media.bytes.len());
            Ok(UploadedMedia {
                url: format!("https://cdn.test/video-{}.mp4", uploads.len()),
                public_id: Some(format!("video-{}", uploads.len())),
            })
        }
    }

    struct FailingUploader;

    impl MediaUploader for FailingUploader {
        fn upload(&self, _media: &MediaFile) -> Result<UploadedMedia> {
            Err(anyhow!("media service unavailable"))
        }
    }

    /// A store whose every call fails, standing in for an unreachable DB.
    struct BrokenStore;

    impl VideoRepository for BrokenStore {
        fn find(&self, _id: &str) -> Result<Option<VideoRecord>> {
            Err(anyhow!("connection refused"))
        }
        fn list(&self) -> Result<Vec<VideoRecord>> {
            Err(anyhow!("connection refused"))
        }
        fn insert(&self, _video: NewVideo) -> Result<VideoRecord> {
            Err(anyhow!("connection refused"))
        }
        fn adjust_counter(
            &self,
            _id: &str,
            _kind: ReactionKind,
            _delta: i64,
        ) -> Result<Option<ReactionCounts>> {
            Err(anyhow!("connection refused"))
        }
    }

    fn form(title: &str, description: &str, bytes: &[u8]) -> UploadForm {
        UploadForm {
            title: Some(title.into()),
            description: Some(description.into()),
            video: Some(MediaFile {
                file_name: Some("clip.mp4".into()),
                content_type: Some("video/mp4".into()),
                bytes: Bytes::copy_from_slice(bytes),
            }),
        }
    }

    fn persistent_library() -> (tempfile::TempDir, VideoLibrary, Arc<RecordingUploader>) {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("videos.db")).unwrap();
        let uploader = Arc::new(RecordingUploader::default());
        let library = VideoLibrary::new(Arc::new(store))
            .with_fallback(fallback_catalog())
            .with_uploader(uploader.clone());
        (dir, library, uploader)
    }

    #[test]
    fn known_ids_resolve_to_matching_records() {
        let library = VideoLibrary::new(Arc::new(MemoryStore::new(demo_catalog())));
        for id in ["default", "embedded", "default2"] {
            assert_eq!(library.get_by_id(id).unwrap().id, id);
        }
    }

    #[test]
    fn demo_library_has_no_fallback() {
        let library = VideoLibrary::new(Arc::new(MemoryStore::default()));
        assert!(matches!(library.get_by_id("default"), Err(VideoError::NotFound)));
    }

    #[test]
    fn malformed_id_falls_back_to_static_catalog() {
        let (_dir, library, _) = persistent_library();
        let record = library.get_by_id("default").unwrap();
        assert_eq!(record.title, "Sample Video Title");
        assert!(matches!(library.get_by_id("embedded"), Err(VideoError::NotFound)));
    }

    #[test]
    fn store_failure_falls_back_then_misses() {
        let library = VideoLibrary::new(Arc::new(BrokenStore)).with_fallback(fallback_catalog());
        assert_eq!(library.get_by_id("default").unwrap().id, "default");
        assert!(matches!(
            library.get_by_id("0123456789abcdef01234567"),
            Err(VideoError::NotFound)
        ));
    }

    #[test]
    fn list_failure_is_upstream() {
        let library = VideoLibrary::new(Arc::new(BrokenStore));
        assert!(matches!(library.list_suggested(), Err(VideoError::Upstream(_))));
        assert!(matches!(library.list_all(), Err(VideoError::Upstream(_))));
    }

    #[test]
    fn suggested_covers_every_record() {
        let library = VideoLibrary::new(Arc::new(MemoryStore::new(demo_catalog())));
        let suggested = library.list_suggested().unwrap();
        assert_eq!(suggested.len(), 3);
        assert_eq!(suggested[1].thumbnail, "/images/sample-thumb2.jpg");

        let empty = VideoLibrary::new(Arc::new(MemoryStore::default()));
        assert!(empty.list_suggested().unwrap().is_empty());
    }

    #[test]
    fn create_persists_zeroed_record() {
        let (_dir, library, uploader) = persistent_library();
        let first = library.create(form("My Title", "My Desc", b"bytes")).unwrap();
        let second = library.create(form("Other", "Desc", b"more bytes")).unwrap();

        assert!(is_store_key(&first.id));
        assert_ne!(first.id, second.id);
        assert_eq!((first.likes, first.dislikes, first.views), (0, 0, 0));
        assert!(!first.is_embed);
        assert_eq!(first.src, "https://cdn.test/video-1.mp4");
        assert_eq!(*uploader.uploads.lock(), vec![5, 10]);

        assert_eq!(library.get_by_id(&first.id).unwrap(), first);
        assert_eq!(library.list_all().unwrap().len(), 2);
    }

    #[test]
    fn create_rejects_missing_fields_without_uploading() {
        let (_dir, library, uploader) = persistent_library();
        for bad in [
            form("", "desc", b"bytes"),
            form("title", "  ", b"bytes"),
            form("title", "desc", b""),
            UploadForm {
                video: None,
                ..form("title", "desc", b"bytes")
            },
        ] {
            assert!(matches!(library.create(bad), Err(VideoError::InvalidInput(_))));
        }
        assert!(uploader.uploads.lock().is_empty());
    }

    #[test]
    fn upload_failure_writes_nothing() {
        let store = Arc::new(MemoryStore::default());
        let library = VideoLibrary::new(store.clone()).with_uploader(Arc::new(FailingUploader));
        assert!(matches!(
            library.create(form("t", "d", b"x")),
            Err(VideoError::Upstream(_))
        ));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn create_without_uploader_is_upstream_error() {
        let library = VideoLibrary::new(Arc::new(MemoryStore::default()));
        assert!(!library.accepts_uploads());
        assert!(matches!(
            library.create(form("t", "d", b"x")),
            Err(VideoError::Upstream(_))
        ));
    }
}
