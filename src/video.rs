//! Video records as stored and exposed by the API.
//!
//! Everything in here is plain data. The JSON field names mirror what the
//! player frontend reads (`isEmbed` and friends), so the structs carry
//! `camelCase` renames rather than mapping at the HTTP edge.

use rand_core::{OsRng, RngCore};
use serde::Serialize;

/// Length in hex characters of an id assigned by a store.
pub const VIDEO_ID_LEN: usize = 24;

/// Full record for a single video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Direct media URL, or a third-party player URL when `is_embed` is set.
    pub src: String,
    pub is_embed: bool,
    pub thumbnail: String,
    pub likes: i64,
    pub dislikes: i64,
    pub views: i64,
}

impl VideoRecord {
    pub fn reactions(&self) -> ReactionCounts {
        ReactionCounts {
            likes: self.likes,
            dislikes: self.dislikes,
        }
    }
}

/// Summary row used for the "up next" sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestedVideo {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub views: i64,
}

impl From<&VideoRecord> for SuggestedVideo {
    fn from(record: &VideoRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            thumbnail: record.thumbnail.clone(),
            views: record.views,
        }
    }
}

/// Like/dislike pair returned after a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

/// A freshly uploaded video waiting for a store to assign its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub src: String,
    /// Asset handle returned by the media service. Never serialized.
    pub public_id: Option<String>,
}

impl NewVideo {
    /// Uploaded videos always start as direct media with zeroed counters and
    /// no thumbnail.
    pub fn into_record(self, id: String) -> VideoRecord {
        VideoRecord {
            id,
            title: self.title,
            description: self.description,
            src: self.src,
            is_embed: false,
            thumbnail: String::new(),
            likes: 0,
            dislikes: 0,
            views: 0,
        }
    }
}

/// Generates a new 24 character lowercase hex id from 12 random bytes.
pub fn generate_video_id() -> String {
    let mut bytes = [0u8; VIDEO_ID_LEN / 2];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Returns true when `id` has the shape of a store-assigned id.
pub fn is_store_key(id: &str) -> bool {
    id.len() == VIDEO_ID_LEN
        && id
            .bytes()
            .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte))
}

fn default_video() -> VideoRecord {
    VideoRecord {
        id: "default".into(),
        title: "Sample Video Title".into(),
        description: "This is a sample description for the video. Enjoy watching!".into(),
        src: "/videos/sample-video.mp4".into(),
        is_embed: false,
        thumbnail: "/images/sample-thumb.jpg".into(),
        likes: 1234,
        dislikes: 56,
        views: 1234567,
    }
}

/// Records the demo server boots with.
pub fn demo_catalog() -> Vec<VideoRecord> {
    vec![
        default_video(),
        VideoRecord {
            id: "embedded".into(),
            title: "Embedded Video Example".into(),
            description: "Example of a YouTube embedded video.".into(),
            src: "https://www.youtube.com/embed/dQw4w9WgXcQ".into(),
            is_embed: true,
            thumbnail: "/images/sample-thumb2.jpg".into(),
            likes: 2345,
            dislikes: 34,
            views: 987654,
        },
        VideoRecord {
            id: "default2".into(),
            title: "Another Cool Video".into(),
            description: "Check out this cool video!".into(),
            src: "/videos/another-video.mp4".into(),
            is_embed: false,
            thumbnail: "/images/sample-thumb3.jpg".into(),
            likes: 3456,
            dislikes: 78,
            views: 2345678,
        },
    ]
}

/// Hardcoded records consulted when the database has no match.
pub fn fallback_catalog() -> Vec<VideoRecord> {
    vec![default_video()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn video_serializes_with_camel_case_fields() {
        let value = serde_json::to_value(default_video()).unwrap();
        assert_eq!(value["isEmbed"], json!(false));
        assert!(value.get("is_embed").is_none());
        assert_eq!(value.as_object().unwrap().len(), 9);
    }

    #[test]
    fn suggested_projection_keeps_four_fields() {
        let suggested = SuggestedVideo::from(&default_video());
        let value = serde_json::to_value(&suggested).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["id", "thumbnail", "title", "views"]);
        assert_eq!(suggested.views, 1234567);
    }

    #[test]
    fn new_video_starts_with_zeroed_counters() {
        let record = NewVideo {
            title: "t".into(),
            description: "d".into(),
            src: "https://cdn.test/v.mp4".into(),
            public_id: Some("abc".into()),
        }
        .into_record("0123456789abcdef01234567".into());
        assert!(!record.is_embed);
        assert!(record.thumbnail.is_empty());
        assert_eq!((record.likes, record.dislikes, record.views), (0, 0, 0));
    }

    #[test]
    fn generated_ids_are_store_keys() {
        let first = generate_video_id();
        let second = generate_video_id();
        assert!(is_store_key(&first));
        assert!(is_store_key(&second));
        assert_ne!(first, second);
    }

    #[test]
    fn store_key_rejects_other_shapes() {
        assert!(!is_store_key("default"));
        assert!(!is_store_key("0123456789ABCDEF01234567"));
        assert!(!is_store_key("0123456789abcdef0123456"));
        assert!(!is_store_key("0123456789abcdef0123456z"));
    }

    #[test]
    fn embed_records_use_player_urls() {
        for record in demo_catalog() {
            assert_eq!(record.is_embed, record.src.starts_with("https://www.youtube.com/embed/"));
        }
    }
}
