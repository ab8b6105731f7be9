//! Thin JSON endpoints over the cached start.gg proxy.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::sgg::queries;
use crate::state::AppState;
use crate::validation::{Validate, ValidJsonOrDefault, ValidationErrors};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VideogamesRequest {
    pub names: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TournamentsRequest {
    pub videogame_ids: Vec<Value>,
    pub country_code: String,
    pub per_page: i64,
}

impl Default for TournamentsRequest {
    fn default() -> Self {
        Self {
            videogame_ids: Vec::new(),
            country_code: "BR".to_string(),
            per_page: 20,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventsRequest {
    pub slug: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventPageRequest {
    pub event_id: Value,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Validate for VideogamesRequest {
    type Output = Self;

    fn validate(self) -> Result<Self, ValidationErrors> {
        Ok(self)
    }
}

impl Validate for TournamentsRequest {
    type Output = Self;

    fn validate(self) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.positive("perPage", self.per_page);
        errors.finish(self)
    }
}

impl Validate for EventsRequest {
    type Output = Self;

    fn validate(self) -> Result<Self, ValidationErrors> {
        Ok(self)
    }
}

impl Validate for EventPageRequest {
    type Output = Self;

    fn validate(self) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(page) = self.page {
            errors.positive("page", page);
        }
        if let Some(per_page) = self.per_page {
            errors.positive("perPage", per_page);
        }
        errors.finish(self)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sgg/health", get(health))
        .route("/api/sgg/videogames", post(videogames))
        .route("/api/sgg/tournaments", post(tournaments))
        .route("/api/sgg/eventsByTournament", post(events_by_tournament))
        .route("/api/sgg/eventEntrants", post(event_entrants))
        .route("/api/sgg/eventSets", post(event_sets))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "tokenLoaded": state.config.startgg.token().is_some(),
    }))
}

async fn videogames(
    State(state): State<AppState>,
    ValidJsonOrDefault(req): ValidJsonOrDefault<VideogamesRequest>,
) -> AppResult<Json<Vec<Value>>> {
    let names = queries::normalize_names(&req.names);
    if names.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let responses = try_join_all(names.into_iter().map(|name| {
        state
            .sgg
            .query(queries::VIDEOGAME_BY_NAME, json!({ "name": name }))
    }))
    .await?;

    Ok(Json(queries::merge_videogames(&responses)))
}

async fn tournaments(
    State(state): State<AppState>,
    ValidJsonOrDefault(req): ValidJsonOrDefault<TournamentsRequest>,
) -> AppResult<Json<Value>> {
    let data = state
        .sgg
        .query(
            queries::TOURNAMENTS_BY_GAME_AND_COUNTRY,
            json!({ "perPage": req.per_page, "c": req.country_code, "g": req.videogame_ids }),
        )
        .await?;
    Ok(Json(queries::tournaments(&data)))
}

async fn events_by_tournament(
    State(state): State<AppState>,
    ValidJsonOrDefault(req): ValidJsonOrDefault<EventsRequest>,
) -> AppResult<Json<Value>> {
    let data = state
        .sgg
        .query(queries::EVENTS_IN_TOURNAMENT, json!({ "slug": req.slug }))
        .await?;
    Ok(Json(queries::events(&data)))
}

async fn event_entrants(
    State(state): State<AppState>,
    ValidJsonOrDefault(req): ValidJsonOrDefault<EventPageRequest>,
) -> AppResult<Json<Value>> {
    let data = state
        .sgg
        .query(
            queries::EVENT_ENTRANTS,
            json!({
                "eventId": req.event_id,
                "page": req.page.unwrap_or(1),
                "perPage": req.per_page.unwrap_or(25),
            }),
        )
        .await?;
    Ok(Json(queries::entrants(&data)))
}

async fn event_sets(
    State(state): State<AppState>,
    ValidJsonOrDefault(req): ValidJsonOrDefault<EventPageRequest>,
) -> AppResult<Json<Value>> {
    let data = state
        .sgg
        .query(
            queries::EVENT_SETS,
            json!({
                "eventId": req.event_id,
                "page": req.page.unwrap_or(1),
                "perPage": req.per_page.unwrap_or(20),
            }),
        )
        .await?;
    Ok(Json(queries::sets(&data)))
}
