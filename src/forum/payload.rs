//! JSON shapes returned by the forum API.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::{ForumCategory, ForumPost, Role};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    pub id: i64,
    pub title: String,
    pub body: Option<String>,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub category: ForumCategory,
    pub author: AuthorSummary,
    pub vote_score: i64,
    pub post_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, page_size: i64, total: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total + page_size - 1) / page_size
        } else {
            0
        };
        Self {
            page,
            page_size,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadPage {
    pub threads: Vec<ThreadSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteEntry {
    pub user_id: String,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub thread: ThreadSummary,
    pub posts: Vec<PostPayload>,
    pub votes: Vec<VoteEntry>,
    /// The caller's own vote, 0 when anonymous or not voted.
    pub user_vote: i64,
}

/// Wire form of a post. Deleted posts never expose their body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPayload {
    pub id: i64,
    pub thread_id: i64,
    pub parent_id: Option<i64>,
    pub body: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub author: AuthorSummary,
}

impl PostPayload {
    pub fn new(post: ForumPost, author: AuthorSummary) -> Self {
        let is_deleted = post.state.is_deleted();
        Self {
            id: post.id,
            thread_id: post.thread_id,
            parent_id: post.parent_id,
            body: if is_deleted { None } else { Some(post.body) },
            is_deleted,
            deleted_at: post.state.deleted_at(),
            created_at: post.created_at,
            author,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadRef {
    pub id: i64,
    pub title: String,
}

/// A post in an author's history with its first-level replies.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorPost {
    #[serde(flatten)]
    pub post: PostPayload,
    pub thread: ThreadRef,
    pub replies: Vec<PostPayload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub success: bool,
    pub vote_score: i64,
    pub user_vote: i64,
}
