//! SQLite-backed store for the persistent server.
//!
//! Each call opens its own short-lived connection so the store can be shared
//! across blocking tasks without a pool. Ids are assigned here, and only
//! 24 character hex ids are treated as keys.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::VideoRepository;
use crate::reaction::ReactionKind;
use crate::video::{NewVideo, ReactionCounts, VideoRecord, generate_video_id, is_store_key};

const SELECT_COLUMNS: &str =
    "id, title, description, src, is_embed, thumbnail, likes, dislikes, views";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Opens (and if necessary creates) the database and ensures the `videos`
    /// table exists. WAL mode keeps readers from blocking the upload writer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening video DB {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("enabling WAL mode for video DB")?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS videos (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                src TEXT NOT NULL,
                is_embed INTEGER NOT NULL DEFAULT 0,
                thumbnail TEXT NOT NULL DEFAULT '',
                likes INTEGER NOT NULL DEFAULT 0,
                dislikes INTEGER NOT NULL DEFAULT 0,
                views INTEGER NOT NULL DEFAULT 0,
                public_id TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .context("creating videos table")?;

        Ok(Self {
            db_path: path.to_path_buf(),
        })
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("opening video DB {}", self.db_path.display()))?;
        f(&conn)
    }
}

impl VideoRepository for SqliteStore {
    fn accepts_key(&self, id: &str) -> bool {
        is_store_key(id)
    }

    fn find(&self, id: &str) -> Result<Option<VideoRecord>> {
        if !is_store_key(id) {
            return Ok(None);
        }
        self.with_connection(|conn| {
            let record = conn
                .query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM videos WHERE id = ?1"),
                    [id],
                    row_to_video,
                )
                .optional()
                .with_context(|| format!("looking up video {id}"))?;
            Ok(record)
        })
    }

    fn list(&self) -> Result<Vec<VideoRecord>> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM videos ORDER BY rowid"))?;
            let records = stmt
                .query_map([], row_to_video)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("listing videos")?;
            Ok(records)
        })
    }

    fn insert(&self, video: NewVideo) -> Result<VideoRecord> {
        self.with_connection(|conn| {
            let created_at = Utc::now().to_rfc3339();
            // A collision on 96 random bits just means another draw.
            loop {
                let id = generate_video_id();
                let inserted = conn
                    .execute(
                        r#"
                        INSERT OR IGNORE INTO videos (
                            id, title, description, src, is_embed, thumbnail,
                            likes, dislikes, views, public_id, created_at
                        ) VALUES (?1, ?2, ?3, ?4, 0, '', 0, 0, 0, ?5, ?6)
                        "#,
                        params![
                            id,
                            video.title,
                            video.description,
                            video.src,
                            video.public_id,
                            created_at,
                        ],
                    )
                    .context("inserting video")?;
                if inserted == 1 {
                    return Ok(video.into_record(id));
                }
            }
        })
    }

    fn adjust_counter(
        &self,
        id: &str,
        kind: ReactionKind,
        delta: i64,
    ) -> Result<Option<ReactionCounts>> {
        if !is_store_key(id) {
            return Ok(None);
        }
        let column = match kind {
            ReactionKind::Like => "likes",
            ReactionKind::Dislike => "dislikes",
        };
        self.with_connection(|conn| {
            // Single statement, so the clamp and the write happen atomically.
            let counts = conn
                .query_row(
                    &format!(
                        "UPDATE videos SET {column} = MAX({column} + ?2, 0) \
                         WHERE id = ?1 RETURNING likes, dislikes"
                    ),
                    params![id, delta],
                    |row| {
                        Ok(ReactionCounts {
                            likes: row.get(0)?,
                            dislikes: row.get(1)?,
                        })
                    },
                )
                .optional()
                .with_context(|| format!("updating {column} for video {id}"))?;
            Ok(counts)
        })
    }
}

fn row_to_video(row: &Row<'_>) -> rusqlite::Result<VideoRecord> {
    Ok(VideoRecord {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        src: row.get("src")?,
        is_embed: row.get::<_, i64>("is_embed")? != 0,
        thumbnail: row.get("thumbnail")?,
        likes: row.get("likes")?,
        dislikes: row.get("dislikes")?,
        views: row.get("views")?,
    })
}
