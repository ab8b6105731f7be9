//! Social feed storage. Images are kept as raw bytes and travel as base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::db::models::FeedPost;
use crate::db::{from_millis, now_millis};
use crate::forum::payload::AuthorSummary;

/// Newest posts returned by a feed listing.
pub const FEED_PAGE: i64 = 50;

#[derive(Debug, Clone)]
pub struct NewFeedPost {
    pub body: String,
    pub image_bytes: Option<Vec<u8>>,
    pub image_mime: Option<String>,
    pub image_filename: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: i64,
    pub author_id: String,
    pub author: AuthorSummary,
    pub body: String,
    pub image_base64: Option<String>,
    pub image_mime: Option<String>,
    pub image_filename: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FeedItem {
    fn new(post: FeedPost, author: AuthorSummary) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            author,
            body: post.body,
            image_base64: post.image_bytes.map(|bytes| STANDARD.encode(bytes)),
            image_mime: post.image_mime,
            image_filename: post.image_filename,
            created_at: post.created_at,
        }
    }
}

const FEED_SELECT: &str = "
    SELECT f.id, f.author_id, f.body, f.image_bytes, f.image_mime, f.image_filename, f.created_at,
           u.id, u.username, u.avatar_url, u.role
    FROM feed_posts f
    JOIN users u ON u.id = f.author_id";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<FeedItem> {
    let post = FeedPost {
        id: row.get(0)?,
        author_id: row.get(1)?,
        body: row.get(2)?,
        image_bytes: row.get(3)?,
        image_mime: row.get(4)?,
        image_filename: row.get(5)?,
        created_at: from_millis(row.get(6)?),
    };
    let author = AuthorSummary {
        id: row.get(7)?,
        username: row.get(8)?,
        avatar_url: row.get(9)?,
        role: row.get(10)?,
    };
    Ok(FeedItem::new(post, author))
}

/// Most recent posts first, optionally for one author.
pub fn list(conn: &Connection, author_id: Option<&str>) -> rusqlite::Result<Vec<FeedItem>> {
    let mut stmt = conn.prepare(&format!(
        "{FEED_SELECT}
         WHERE (?1 IS NULL OR f.author_id = ?1)
         ORDER BY f.created_at DESC, f.id DESC
         LIMIT ?2"
    ))?;
    let items = stmt
        .query_map(params![author_id, FEED_PAGE], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn create(conn: &Connection, author_id: &str, new: &NewFeedPost) -> rusqlite::Result<FeedItem> {
    conn.execute(
        "INSERT INTO feed_posts (author_id, body, image_bytes, image_mime, image_filename, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            author_id,
            new.body,
            new.image_bytes,
            new.image_mime,
            new.image_filename,
            now_millis()
        ],
    )?;
    let id = conn.last_insert_rowid();
    conn.query_row(
        &format!("{FEED_SELECT} WHERE f.id = ?1"),
        params![id],
        item_from_row,
    )
}
