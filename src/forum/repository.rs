//! SQL access for the forum. Multi-row writes run inside one IMMEDIATE
//! transaction so that no partial state is ever visible.

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::db::models::{ForumCategory, ForumPost, ForumThread, PostState};
use crate::db::{from_millis, now_millis};
use crate::forum::payload::{
    AuthorPost, AuthorSummary, Pagination, PostPayload, ThreadDetail, ThreadPage, ThreadRef,
    ThreadSummary, VoteEntry, VoteOutcome,
};
use crate::forum::ranking::{SortMode, SCORE_EXPR};
use crate::forum::ForumError;

/// Cap on an author's post history.
pub const AUTHOR_POSTS_LIMIT: i64 = 200;

#[derive(Debug, Clone)]
pub struct NewThread {
    pub category_id: i64,
    pub title: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReply {
    pub body: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ThreadListQuery {
    pub category_id: Option<i64>,
    pub sort: SortMode,
    pub page: i64,
    pub page_size: i64,
}

const THREAD_SUMMARY_SELECT: &str = "
    SELECT t.id, t.title, t.body, t.is_pinned, t.is_locked, t.created_at, t.last_activity_at,
           c.id, c.slug, c.name,
           u.id, u.username, u.avatar_url, u.role,
           COALESCE(vs.score, 0),
           (SELECT COUNT(*) FROM forum_posts p
             WHERE p.thread_id = t.id AND p.deleted_at IS NULL)
    FROM forum_threads t
    JOIN forum_categories c ON c.id = t.category_id
    JOIN users u ON u.id = t.author_id
    LEFT JOIN (SELECT thread_id, SUM(value) AS score FROM forum_votes GROUP BY thread_id) vs
      ON vs.thread_id = t.id";

const POST_SELECT: &str = "
    SELECT p.id, p.thread_id, p.parent_id, p.author_id, p.body, p.created_at, p.deleted_at,
           u.id, u.username, u.avatar_url, u.role
    FROM forum_posts p
    JOIN users u ON u.id = p.author_id";

fn author_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<AuthorSummary> {
    Ok(AuthorSummary {
        id: row.get(offset)?,
        username: row.get(offset + 1)?,
        avatar_url: row.get(offset + 2)?,
        role: row.get(offset + 3)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<ThreadSummary> {
    Ok(ThreadSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        is_pinned: row.get(3)?,
        is_locked: row.get(4)?,
        created_at: from_millis(row.get(5)?),
        last_activity_at: from_millis(row.get(6)?),
        category: ForumCategory {
            id: row.get(7)?,
            slug: row.get(8)?,
            name: row.get(9)?,
        },
        author: author_from_row(row, 10)?,
        vote_score: row.get(14)?,
        post_count: row.get(15)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<ForumPost> {
    let deleted_at: Option<i64> = row.get(6)?;
    Ok(ForumPost {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        parent_id: row.get(2)?,
        author_id: row.get(3)?,
        body: row.get(4)?,
        created_at: from_millis(row.get(5)?),
        state: PostState::from_deleted_at(deleted_at.map(from_millis)),
    })
}

fn payload_from_row(row: &Row<'_>) -> rusqlite::Result<PostPayload> {
    Ok(PostPayload::new(post_from_row(row)?, author_from_row(row, 7)?))
}

fn thread_from_row(row: &Row<'_>) -> rusqlite::Result<ForumThread> {
    Ok(ForumThread {
        id: row.get(0)?,
        category_id: row.get(1)?,
        author_id: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        is_pinned: row.get(5)?,
        is_locked: row.get(6)?,
        created_at: from_millis(row.get(7)?),
        last_activity_at: from_millis(row.get(8)?),
    })
}

/// Raises `last_activity_at` to `now` without ever moving it backwards.
fn bump_activity(conn: &Connection, thread_id: i64, now: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE forum_threads SET last_activity_at = MAX(last_activity_at, ?1) WHERE id = ?2",
        params![now, thread_id],
    )?;
    Ok(())
}

fn vote_score(conn: &Connection, thread_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(value), 0) FROM forum_votes WHERE thread_id = ?1",
        params![thread_id],
        |row| row.get(0),
    )
}

pub fn list_categories(conn: &Connection) -> rusqlite::Result<Vec<ForumCategory>> {
    let mut stmt = conn.prepare("SELECT id, slug, name FROM forum_categories ORDER BY id ASC")?;
    let categories = stmt
        .query_map([], |row| {
            Ok(ForumCategory {
                id: row.get(0)?,
                slug: row.get(1)?,
                name: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub fn find_thread(conn: &Connection, id: i64) -> rusqlite::Result<Option<ForumThread>> {
    conn.query_row(
        "SELECT id, category_id, author_id, title, body, is_pinned, is_locked,
                created_at, last_activity_at
         FROM forum_threads WHERE id = ?1",
        params![id],
        thread_from_row,
    )
    .optional()
}

pub fn thread_summary(conn: &Connection, id: i64) -> rusqlite::Result<Option<ThreadSummary>> {
    conn.query_row(
        &format!("{THREAD_SUMMARY_SELECT} WHERE t.id = ?1"),
        params![id],
        summary_from_row,
    )
    .optional()
}

pub fn create_thread(
    conn: &Connection,
    author_id: &str,
    new: &NewThread,
) -> Result<ThreadSummary, ForumError> {
    let category_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM forum_categories WHERE id = ?1",
        params![new.category_id],
        |row| row.get(0),
    )?;
    if !category_exists {
        return Err(ForumError::CategoryNotFound);
    }

    let now = now_millis();
    conn.execute(
        "INSERT INTO forum_threads
           (category_id, author_id, title, body, is_pinned, is_locked, created_at, last_activity_at)
         VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?5)",
        params![new.category_id, author_id, new.title, new.body, now],
    )?;
    let id = conn.last_insert_rowid();

    thread_summary(conn, id)?.ok_or(ForumError::ThreadNotFound)
}

/// One page of threads ordered globally by `query.sort`.
pub fn list_threads(conn: &Connection, query: &ThreadListQuery) -> rusqlite::Result<ThreadPage> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM forum_threads t WHERE (?1 IS NULL OR t.category_id = ?1)",
        params![query.category_id],
        |row| row.get(0),
    )?;

    let sql = format!(
        "{THREAD_SUMMARY_SELECT}
         WHERE (?1 IS NULL OR t.category_id = ?1)
         ORDER BY {}
         LIMIT ?2 OFFSET ?3",
        query.sort.order_by()
    );
    let pagination = Pagination::new(query.page, query.page_size, total);
    // A page past i64 range cannot hold rows.
    let Some(offset) = query.page.saturating_sub(1).max(0).checked_mul(query.page_size) else {
        return Ok(ThreadPage {
            threads: Vec::new(),
            pagination,
        });
    };
    let mut stmt = conn.prepare(&sql)?;
    let threads = stmt
        .query_map(
            params![query.category_id, query.page_size, offset],
            summary_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ThreadPage {
        threads,
        pagination,
    })
}

/// Thread with its live posts (oldest first), vote rows and the viewer's vote.
pub fn thread_detail(
    conn: &Connection,
    id: i64,
    viewer_id: Option<&str>,
) -> rusqlite::Result<Option<ThreadDetail>> {
    let Some(thread) = thread_summary(conn, id)? else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT}
         WHERE p.thread_id = ?1 AND p.deleted_at IS NULL
         ORDER BY p.created_at ASC, p.id ASC"
    ))?;
    let posts = stmt
        .query_map(params![id], payload_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT user_id, value FROM forum_votes WHERE thread_id = ?1 ORDER BY created_at ASC",
    )?;
    let votes = stmt
        .query_map(params![id], |row| {
            Ok(VoteEntry {
                user_id: row.get(0)?,
                value: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let user_vote = viewer_id
        .and_then(|viewer| votes.iter().find(|v| v.user_id == viewer))
        .map(|v| v.value)
        .unwrap_or(0);

    Ok(Some(ThreadDetail {
        thread,
        posts,
        votes,
        user_vote,
    }))
}

/// Records a reply and bumps the thread's activity in one transaction.
/// The lock flag is read inside the transaction.
pub fn create_reply(
    conn: &mut Connection,
    thread_id: i64,
    author_id: &str,
    reply: &NewReply,
) -> Result<PostPayload, ForumError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let thread = find_thread(&tx, thread_id)?.ok_or(ForumError::ThreadNotFound)?;
    if thread.is_locked {
        return Err(ForumError::ThreadLocked);
    }

    if let Some(parent_id) = reply.parent_id {
        let parent_in_thread: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM forum_posts WHERE id = ?1 AND thread_id = ?2",
            params![parent_id, thread_id],
            |row| row.get(0),
        )?;
        if !parent_in_thread {
            return Err(ForumError::ParentNotFound);
        }
    }

    let now = now_millis();
    tx.execute(
        "INSERT INTO forum_posts (thread_id, parent_id, author_id, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![thread_id, reply.parent_id, author_id, reply.body, now],
    )?;
    let post_id = tx.last_insert_rowid();
    bump_activity(&tx, thread_id, now)?;

    let payload = find_post(&tx, post_id)?.ok_or(ForumError::PostNotFound)?;
    tx.commit()?;
    Ok(payload)
}

/// Upserts (`±1`) or clears (`0`) the caller's vote, then bumps activity.
pub fn cast_vote(
    conn: &mut Connection,
    thread_id: i64,
    user_id: &str,
    value: i64,
) -> Result<VoteOutcome, ForumError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if find_thread(&tx, thread_id)?.is_none() {
        return Err(ForumError::ThreadNotFound);
    }

    let now = now_millis();
    if value == 0 {
        tx.execute(
            "DELETE FROM forum_votes WHERE user_id = ?1 AND thread_id = ?2",
            params![user_id, thread_id],
        )?;
    } else {
        tx.execute(
            "INSERT INTO forum_votes (user_id, thread_id, value, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(user_id, thread_id) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![user_id, thread_id, value, now],
        )?;
    }
    bump_activity(&tx, thread_id, now)?;

    let score = vote_score(&tx, thread_id)?;
    tx.commit()?;

    Ok(VoteOutcome {
        success: true,
        vote_score: score,
        user_vote: value,
    })
}

/// Any post by id, deleted or not.
pub fn find_post(conn: &Connection, id: i64) -> rusqlite::Result<Option<PostPayload>> {
    conn.query_row(
        &format!("{POST_SELECT} WHERE p.id = ?1"),
        params![id],
        payload_from_row,
    )
    .optional()
}

/// An author's live posts, newest first, each with its live direct replies.
pub fn posts_by_author(conn: &Connection, author_id: &str) -> rusqlite::Result<Vec<AuthorPost>> {
    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT}
         WHERE p.author_id = ?1 AND p.deleted_at IS NULL
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?2"
    ))?;
    let posts = stmt
        .query_map(params![author_id, AUTHOR_POSTS_LIMIT], payload_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut thread_stmt = conn.prepare("SELECT id, title FROM forum_threads WHERE id = ?1")?;
    let mut reply_stmt = conn.prepare(&format!(
        "{POST_SELECT}
         WHERE p.parent_id = ?1 AND p.deleted_at IS NULL
         ORDER BY p.created_at ASC, p.id ASC"
    ))?;

    let mut results = Vec::with_capacity(posts.len());
    for post in posts {
        let thread = thread_stmt.query_row(params![post.thread_id], |row| {
            Ok(ThreadRef {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        })?;
        let replies = reply_stmt
            .query_map(params![post.id], payload_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        results.push(AuthorPost {
            post,
            thread,
            replies,
        });
    }

    Ok(results)
}

/// Flips the pinned flag, returning the new value.
pub fn toggle_pin(conn: &Connection, thread_id: i64) -> Result<bool, ForumError> {
    toggle_flag(conn, thread_id, "is_pinned")
}

/// Flips the locked flag, returning the new value.
pub fn toggle_lock(conn: &Connection, thread_id: i64) -> Result<bool, ForumError> {
    toggle_flag(conn, thread_id, "is_locked")
}

fn toggle_flag(conn: &Connection, thread_id: i64, column: &str) -> Result<bool, ForumError> {
    conn.query_row(
        &format!(
            "UPDATE forum_threads SET {column} = NOT {column} WHERE id = ?1 RETURNING {column}"
        ),
        params![thread_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(ForumError::ThreadNotFound)
}

/// Marks a post deleted. Deleting twice is an error.
pub fn soft_delete_post(conn: &Connection, post_id: i64) -> Result<PostPayload, ForumError> {
    let post = find_post(conn, post_id)?.ok_or(ForumError::PostNotFound)?;
    if post.is_deleted {
        return Err(ForumError::AlreadyDeleted);
    }

    let changed = conn.execute(
        "UPDATE forum_posts SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        params![now_millis(), post_id],
    )?;
    if changed == 0 {
        return Err(ForumError::AlreadyDeleted);
    }

    find_post(conn, post_id)?.ok_or(ForumError::PostNotFound)
}

/// Removes a thread with all of its posts and votes, all or nothing.
pub fn delete_thread(conn: &mut Connection, thread_id: i64) -> Result<(), ForumError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if find_thread(&tx, thread_id)?.is_none() {
        return Err(ForumError::ThreadNotFound);
    }

    tx.execute(
        "DELETE FROM forum_posts WHERE thread_id = ?1",
        params![thread_id],
    )?;
    tx.execute(
        "DELETE FROM forum_votes WHERE thread_id = ?1",
        params![thread_id],
    )?;
    tx.execute("DELETE FROM forum_threads WHERE id = ?1", params![thread_id])?;

    tx.commit()?;
    Ok(())
}
