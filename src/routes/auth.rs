use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::users::{self, NewUser, ProfileUpdate};
use crate::auth::{password, session};
use crate::config::AuthConfig;
use crate::db::models::{Role, User};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::rate_limit::{AuthLimit, RateLimited};
use crate::state::AppState;
use crate::validation::{Validate, ValidJson, ValidationErrors};

// -- Wire types --

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub school: Option<String>,
}

impl From<User> for UserPayload {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            school: user.school,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl Validate for RegisterRequest {
    type Output = Self;

    fn validate(self) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.email("email", &self.email);
        errors.length("email", &self.email, 3, 255);
        errors.length("username", &self.username, 2, 50);
        errors.username("username", &self.username);
        errors.length("password", &self.password, 6, 100);
        errors.finish(self)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email_or_username: String,
    pub password: String,
}

impl Validate for LoginRequest {
    type Output = Self;

    fn validate(self) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.length("emailOrUsername", &self.email_or_username, 2, 255);
        errors.length("password", &self.password, 1, 100);
        errors.finish(self)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub school: Option<String>,
}

impl Validate for ProfileRequest {
    type Output = ProfileUpdate;

    fn validate(self) -> Result<ProfileUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Some(name) = &self.display_name {
            errors.length("displayName", name, 0, 50);
        }
        if let Some(url) = &self.avatar_url {
            errors.length("avatarUrl", url, 0, 500);
        }
        if let Some(school) = &self.school {
            errors.length("school", school, 0, 120);
        }
        errors.finish(ProfileUpdate {
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            school: self.school,
        })
    }
}

// -- Cookie helpers --

fn session_cookie(auth: &AuthConfig, token: &str) -> String {
    let max_age_secs = auth.session_ttl().num_seconds();
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        auth.cookie_name, token, max_age_secs
    );
    if auth.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_session_cookie(auth: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        auth.cookie_name
    )
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Issues a session for `user` and answers with its cookie.
fn signed_in(state: &AppState, user: User) -> AppResult<Response> {
    let issued = {
        let conn = state.db.get()?;
        session::create_session(&conn, &user.id, state.config.auth.session_ttl())?
    };

    Ok((
        [(
            header::SET_COOKIE,
            session_cookie(&state.config.auth, &issued.token),
        )],
        Json(json!({ "user": UserPayload::from(user) })),
    )
        .into_response())
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me).patch(update_me))
}

// -- Handlers --

async fn register(
    State(state): State<AppState>,
    _limit: RateLimited<AuthLimit>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> AppResult<Response> {
    {
        let conn = state.db.get()?;
        if let Some(existing) = users::find_conflict(&conn, &req.email, &req.username)? {
            let message = if existing.email == req.email {
                "Email already registered"
            } else {
                "Username already taken"
            };
            return Err(AppError::Conflict(message.into()));
        }
    }

    let cost = state.config.auth.bcrypt_cost;
    let plaintext = req.password;
    let password_hash = tokio::task::spawn_blocking(move || password::hash(&plaintext, cost))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let user = {
        let conn = state.db.get()?;
        users::insert(
            &conn,
            &NewUser {
                email: &req.email,
                username: &req.username,
                password_hash: &password_hash,
            },
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Email or username already taken".into())
            } else {
                AppError::Database(e)
            }
        })?
    };

    tracing::info!("Registered user {}", user.username);
    signed_in(&state, user)
}

async fn login(
    State(state): State<AppState>,
    _limit: RateLimited<AuthLimit>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> AppResult<Response> {
    let user = {
        let conn = state.db.get()?;
        users::find_by_login(&conn, &req.email_or_username)?
    }
    .ok_or(AppError::InvalidCredentials)?;

    let stored_hash = user.password_hash.clone();
    let plaintext = req.password;
    let valid = tokio::task::spawn_blocking(move || password::verify(&plaintext, &stored_hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if !valid {
        return Err(AppError::InvalidCredentials);
    }

    signed_in(&state, user)
}

async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    {
        let conn = state.db.get()?;
        session::delete_session(&conn, &user.session.id)?;
    }

    Ok((
        [(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth),
        )],
        Json(json!({ "success": true })),
    )
        .into_response())
}

async fn me(MaybeUser(user): MaybeUser) -> Json<serde_json::Value> {
    let user = user.map(|u| UserPayload::from(u.user));
    Json(json!({ "user": user }))
}

async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidJson(update): ValidJson<ProfileRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let updated = {
        let conn = state.db.get()?;
        users::update_profile(&conn, user.id(), &update)?
    }
    .ok_or_else(|| AppError::not_found("User"))?;

    Ok(Json(json!({ "user": UserPayload::from(updated) })))
}
