use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::ForumCategory;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser, PathId};
use crate::forum::payload::{PostPayload, ThreadDetail, ThreadPage, ThreadSummary, VoteOutcome};
use crate::forum::ranking::SortMode;
use crate::forum::repository::{self, NewReply, NewThread, ThreadListQuery};
use crate::rate_limit::{PostLimit, RateLimited, ThreadLimit, VoteLimit};
use crate::state::AppState;
use crate::validation::{Validate, ValidJson, ValidQuery, ValidationErrors};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

// --- Request schemas ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadRequest {
    pub category_id: i64,
    pub title: String,
    pub body: Option<String>,
}

impl Validate for CreateThreadRequest {
    type Output = NewThread;

    fn validate(self) -> Result<NewThread, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.positive("categoryId", self.category_id);
        errors.length("title", &self.title, 4, 140);
        if let Some(body) = &self.body {
            errors.length("body", body, 1, 10_000);
        }
        errors.finish(NewThread {
            category_id: self.category_id,
            title: self.title,
            body: self.body,
        })
    }
}

/// Query-string values arrive as text and are coerced here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListThreadsParams {
    pub category_id: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl Validate for ListThreadsParams {
    type Output = ThreadListQuery;

    fn validate(self) -> Result<ThreadListQuery, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let category_id = errors.parse_int("categoryId", self.category_id.as_deref());
        if let Some(id) = category_id {
            errors.positive("categoryId", id);
        }

        let sort = match self.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => SortMode::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                errors.field("sort", "must be one of hot, new, top");
                SortMode::default()
            }),
        };

        let page = errors.parse_int("page", self.page.as_deref()).unwrap_or(1);
        errors.positive("page", page);

        let page_size = errors
            .parse_int("pageSize", self.page_size.as_deref())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        errors.positive("pageSize", page_size);
        if page_size > MAX_PAGE_SIZE {
            errors.field("pageSize", format!("must be at most {}", MAX_PAGE_SIZE));
        }

        errors.finish(ThreadListQuery {
            category_id,
            sort,
            page,
            page_size,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReplyRequest {
    pub body: String,
    pub parent_id: Option<i64>,
}

impl Validate for CreateReplyRequest {
    type Output = NewReply;

    fn validate(self) -> Result<NewReply, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.length("body", &self.body, 1, 10_000);
        if let Some(parent_id) = self.parent_id {
            errors.positive("parentId", parent_id);
        }
        errors.finish(NewReply {
            body: self.body,
            parent_id: self.parent_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub value: i64,
}

impl Validate for VoteRequest {
    type Output = i64;

    fn validate(self) -> Result<i64, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if !(-1..=1).contains(&self.value) {
            errors.field("value", "must be -1, 0 or 1");
        }
        errors.finish(self.value)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorParams {
    pub author_id: Option<String>,
}

impl Validate for AuthorParams {
    type Output = String;

    fn validate(self) -> Result<String, ValidationErrors> {
        match self.author_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => Ok(id),
            None => {
                let mut errors = ValidationErrors::default();
                errors.field("authorId", "is required");
                Err(errors)
            }
        }
    }
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/forums/categories", get(list_categories))
        .route("/api/forums/threads", get(list_threads).post(create_thread))
        .route("/api/forums/threads/{id}", get(get_thread))
        .route("/api/forums/threads/{id}/posts", post(create_reply))
        .route("/api/forums/threads/{id}/vote", post(vote))
        .route("/api/forums/posts", get(posts_by_author))
        .route("/api/forums/posts/{id}", get(get_post))
}

// --- Handlers ---

async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<ForumCategory>>> {
    let conn = state.db.get()?;
    Ok(Json(repository::list_categories(&conn)?))
}

async fn create_thread(
    State(state): State<AppState>,
    user: CurrentUser,
    _limit: RateLimited<ThreadLimit>,
    ValidJson(new): ValidJson<CreateThreadRequest>,
) -> AppResult<Json<ThreadSummary>> {
    let thread = {
        let conn = state.db.get()?;
        repository::create_thread(&conn, user.id(), &new)?
    };
    tracing::info!("Thread {} created by {}", thread.id, user.user.username);
    Ok(Json(thread))
}

async fn list_threads(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ListThreadsParams>,
) -> AppResult<Json<ThreadPage>> {
    let conn = state.db.get()?;
    Ok(Json(repository::list_threads(&conn, &query)?))
}

async fn get_thread(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    PathId(id): PathId,
) -> AppResult<Json<ThreadDetail>> {
    let conn = state.db.get()?;
    repository::thread_detail(&conn, id, viewer.as_ref().map(|v| v.id()))?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Thread"))
}

async fn create_reply(
    State(state): State<AppState>,
    user: CurrentUser,
    _limit: RateLimited<PostLimit>,
    PathId(thread_id): PathId,
    ValidJson(reply): ValidJson<CreateReplyRequest>,
) -> AppResult<Json<PostPayload>> {
    let mut conn = state.db.get()?;
    let post = repository::create_reply(&mut conn, thread_id, user.id(), &reply)?;
    Ok(Json(post))
}

async fn vote(
    State(state): State<AppState>,
    user: CurrentUser,
    _limit: RateLimited<VoteLimit>,
    PathId(thread_id): PathId,
    ValidJson(value): ValidJson<VoteRequest>,
) -> AppResult<Json<VoteOutcome>> {
    let mut conn = state.db.get()?;
    let outcome = repository::cast_vote(&mut conn, thread_id, user.id(), value)?;
    Ok(Json(outcome))
}

async fn posts_by_author(
    State(state): State<AppState>,
    ValidQuery(author_id): ValidQuery<AuthorParams>,
) -> AppResult<Json<serde_json::Value>> {
    let posts = {
        let conn = state.db.get()?;
        repository::posts_by_author(&conn, &author_id)?
    };
    tracing::debug!("Found {} forum posts for {}", posts.len(), author_id);
    Ok(Json(json!({ "posts": posts })))
}

async fn get_post(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> AppResult<Json<PostPayload>> {
    let conn = state.db.get()?;
    repository::find_post(&conn, id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Post"))
}
