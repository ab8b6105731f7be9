use axum::extract::{FromRequestParts, Path};
use axum::http::header;
use axum::http::request::Parts;
use chrono::Utc;

use crate::auth::session;
use crate::db::models::{Role, Session, User};
use crate::error::AppError;
use crate::state::AppState;

/// The caller resolved from the session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    /// Fails with 403 when the caller ranks below `required`.
    pub fn require_role(&self, required: Role) -> Result<(), AppError> {
        if self.user.role.at_least(required) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Forbidden".into()))
        }
    }
}

/// Resolves the session cookie. A missing, unknown or expired token is
/// anonymous rather than an error; only storage failures propagate.
async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    let Some(token) = extract_session_token(parts, &state.config.auth.cookie_name) else {
        return Ok(None);
    };

    let conn = state.db.get()?;
    let found = session::resolve_session(&conn, token, Utc::now())?;
    Ok(found.map(|(session, user)| CurrentUser { user, session }))
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state).await?.ok_or(AppError::Unauthorized)
    }
}

/// Optional user extractor. Yields None instead of a 401 when not signed in.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve(parts, state).await?))
    }
}

/// Caller with at least the MOD role.
pub struct Moderator(pub CurrentUser);

impl FromRequestParts<AppState> for Moderator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        user.require_role(Role::Mod)?;
        Ok(Moderator(user))
    }
}

/// Caller with the ADMIN role.
pub struct Admin(pub CurrentUser);

impl FromRequestParts<AppState> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        user.require_role(Role::Admin)?;
        Ok(Admin(user))
    }
}

/// Numeric `{id}` path segment. A non-numeric id is a JSON 400.
pub struct PathId(pub i64);

impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(PathId(id))
    }
}

fn extract_session_token<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_cookie(cookie: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(header::COOKIE, cookie)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn finds_named_cookie_among_others() {
        let parts = parts_with_cookie("theme=dark; session=abc123; other=1");
        assert_eq!(extract_session_token(&parts, "session"), Some("abc123"));
    }

    #[test]
    fn ignores_missing_or_empty_cookie() {
        let parts = parts_with_cookie("theme=dark; session=");
        assert_eq!(extract_session_token(&parts, "session"), None);
        let parts = parts_with_cookie("sessionx=abc");
        assert_eq!(extract_session_token(&parts, "session"), None);
    }
}
