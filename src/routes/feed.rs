use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::feed::{self, FeedItem, NewFeedPost};
use crate::state::AppState;
use crate::validation::{Validate, ValidJson, ValidationErrors};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedParams {
    pub author_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateFeedRequest {
    pub body: String,
    pub image_base64: Option<String>,
    pub image_mime: Option<String>,
    pub image_filename: Option<String>,
}

impl Validate for CreateFeedRequest {
    type Output = NewFeedPost;

    fn validate(self) -> Result<NewFeedPost, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let body = self.body.trim().to_string();
        if body.is_empty() {
            errors.field("body", "is required");
        }

        let image_bytes = match self.image_base64.as_deref().filter(|s| !s.is_empty()) {
            None => None,
            Some(encoded) => match STANDARD.decode(encoded.trim()) {
                Ok(bytes) => Some(bytes),
                Err(_) => {
                    errors.field("imageBase64", "must be valid base64");
                    None
                }
            },
        };

        errors.finish(NewFeedPost {
            body,
            image_bytes,
            image_mime: self.image_mime.filter(|s| !s.is_empty()),
            image_filename: self.image_filename.filter(|s| !s.is_empty()),
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/feed", get(list_feed).post(create_feed_post))
}

async fn list_feed(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> AppResult<Json<Vec<FeedItem>>> {
    let author = params.author_id.filter(|id| !id.is_empty());
    let conn = state.db.get()?;
    Ok(Json(feed::list(&conn, author.as_deref())?))
}

async fn create_feed_post(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidJson(new): ValidJson<CreateFeedRequest>,
) -> AppResult<Json<FeedItem>> {
    let conn = state.db.get()?;
    Ok(Json(feed::create(&conn, user.id(), &new)?))
}
