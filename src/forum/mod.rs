//! Forum threads, replies, votes and moderation state.

pub mod payload;
pub mod ranking;
pub mod repository;

use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum ForumError {
    #[error("Category not found")]
    CategoryNotFound,

    #[error("Thread not found")]
    ThreadNotFound,

    #[error("Post not found")]
    PostNotFound,

    #[error("Parent post not found in this thread")]
    ParentNotFound,

    #[error("Thread is locked")]
    ThreadLocked,

    #[error("Post already deleted")]
    AlreadyDeleted,

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),
}

impl From<ForumError> for AppError {
    fn from(err: ForumError) -> Self {
        match err {
            ForumError::CategoryNotFound => AppError::not_found("Category"),
            ForumError::ThreadNotFound => AppError::not_found("Thread"),
            ForumError::PostNotFound => AppError::not_found("Post"),
            ForumError::ParentNotFound => AppError::BadRequest(err.to_string()),
            ForumError::ThreadLocked => AppError::Forbidden(err.to_string()),
            ForumError::AlreadyDeleted => AppError::Conflict(err.to_string()),
            ForumError::Sql(e) => AppError::Database(e),
        }
    }
}
