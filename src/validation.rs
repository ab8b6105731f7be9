//! Boundary validation for request bodies and query strings.
//!
//! Each route declares a raw input type implementing [`Validate`]. The
//! [`ValidJson`] and [`ValidQuery`] extractors deserialize the raw input,
//! run its checks and hand the typed output to the handler. Any failure is
//! answered with a 400 carrying per-field messages before the handler runs.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid username regex"));

/// Field-level violations, shaped like `{ formErrors, fieldErrors }`.
#[derive(Debug, Default, Clone, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("validation failed")]
pub struct ValidationErrors {
    pub form_errors: Vec<String>,
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn form(message: impl Into<String>) -> Self {
        Self {
            form_errors: vec![message.into()],
            field_errors: BTreeMap::new(),
        }
    }

    pub fn field(&mut self, name: &str, message: impl Into<String>) {
        self.field_errors
            .entry(name.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.form_errors.is_empty() && self.field_errors.is_empty()
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// Checks a string's length in characters against an inclusive range.
    pub fn length(&mut self, name: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min {
            self.field(name, format!("must be at least {} characters", min));
        } else if len > max {
            self.field(name, format!("must be at most {} characters", max));
        }
    }

    pub fn email(&mut self, name: &str, value: &str) {
        if !EMAIL_RE.is_match(value) {
            self.field(name, "must be a valid email address");
        }
    }

    pub fn username(&mut self, name: &str, value: &str) {
        if !USERNAME_RE.is_match(value) {
            self.field(name, "may only contain letters, digits, '_' and '-'");
        }
    }

    pub fn positive(&mut self, name: &str, value: i64) {
        if value <= 0 {
            self.field(name, "must be a positive integer");
        }
    }

    /// Parses an optional query-string integer, recording a violation when
    /// the text is not a number.
    pub fn parse_int(&mut self, name: &str, raw: Option<&str>) -> Option<i64> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
        match raw.parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                self.field(name, "must be an integer");
                None
            }
        }
    }
}

/// Raw input that can be checked and converted into its typed form.
pub trait Validate {
    type Output;

    fn validate(self) -> Result<Self::Output, ValidationErrors>;
}

/// JSON body validated through `T`'s [`Validate`] impl.
pub struct ValidJson<T: Validate>(pub T::Output);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: Validate + DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ValidationErrors::form(rejection.body_text()))?;
        Ok(ValidJson(raw.validate()?))
    }
}

/// Like [`ValidJson`], but a missing or blank body stands for
/// `T::default()`. Used where every field has a fallback.
pub struct ValidJsonOrDefault<T: Validate>(pub T::Output);

impl<S, T> FromRequest<S> for ValidJsonOrDefault<T>
where
    S: Send + Sync,
    T: Validate + DeserializeOwned + Default + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ValidationErrors::form(rejection.body_text()))?;
        let raw = if bytes.trim_ascii().is_empty() {
            T::default()
        } else {
            serde_json::from_slice::<T>(&bytes).map_err(|e| {
                ValidationErrors::form(format!("Failed to deserialize the JSON body: {}", e))
            })?
        };
        Ok(ValidJsonOrDefault(raw.validate()?))
    }
}

/// Query string validated through `T`'s [`Validate`] impl.
pub struct ValidQuery<T: Validate>(pub T::Output);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: Validate + DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ValidationErrors::form(rejection.body_text()))?;
        Ok(ValidQuery(raw.validate()?))
    }
}
