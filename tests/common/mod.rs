#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use arenahub::auth::users;
use arenahub::config::{Config, WindowLimit};
use arenahub::db;
use arenahub::db::models::Role;
use arenahub::routes;
use arenahub::sgg::{ProxyError, Upstream};
use arenahub::state::{AppState, DbPool};

/// Upstream double that records every call and answers from a closure.
pub struct FakeUpstream {
    pub calls: Mutex<Vec<(String, Value)>>,
    respond: Box<dyn Fn(&str, &Value) -> Result<Value, ProxyError> + Send + Sync>,
}

impl FakeUpstream {
    pub fn new(
        respond: impl Fn(&str, &Value) -> Result<Value, ProxyError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    pub fn empty() -> Self {
        Self::new(|_, _| Ok(Value::Null))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn execute(&self, query: &str, variables: &Value) -> Result<Value, ProxyError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), variables.clone()));
        (self.respond)(query, variables)
    }
}

pub struct TestApp {
    _dir: TempDir,
    pub db: DbPool,
    pub router: Router,
    pub upstream: Arc<FakeUpstream>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` of the Set-Cookie header, ready to send back.
    pub fn cookie(&self) -> String {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .expect("response sets a cookie")
            .to_string()
    }

    pub fn set_cookie(&self) -> String {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

/// Defaults tuned for tests: cheap hashing and limits nobody hits by accident.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.bcrypt_cost = 4;
    config.startgg.token = Some("test-token-0123456789abcdef".to_string());
    config.rate_limits.threads = WindowLimit::new(1000, 60);
    config.rate_limits.posts = WindowLimit::new(1000, 60);
    config.rate_limits.votes = WindowLimit::new(1000, 60);
    config.rate_limits.auth = WindowLimit::new(1000, 60);
    config
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), FakeUpstream::empty())
}

pub fn spawn_app_with(config: Config, upstream: FakeUpstream) -> TestApp {
    let dir = TempDir::new().unwrap();
    let pool = db::create_pool(&dir.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let upstream = Arc::new(upstream);
    let state = AppState::new(pool.clone(), config, upstream.clone());

    TestApp {
        _dir: dir,
        db: pool,
        router: routes::app(state),
        upstream,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, cookie, None).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, cookie, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, cookie, None).await
    }

    /// Registers a user and returns `(cookie, user id)`.
    pub async fn register(&self, username: &str) -> (String, String) {
        let res = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "email": format!("{}@example.com", username),
                    "username": username,
                    "password": "password1",
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "register failed: {}", res.body);
        let id = res.body["user"]["id"].as_str().unwrap().to_string();
        (res.cookie(), id)
    }

    /// Registers a user holding `role`.
    pub async fn register_with_role(&self, username: &str, role: Role) -> (String, String) {
        let (cookie, id) = self.register(username).await;
        let conn = self.db.get().unwrap();
        users::set_role(&conn, &id, role).unwrap();
        (cookie, id)
    }

    /// Creates a thread in the General category and returns its id.
    pub async fn create_thread(&self, cookie: &str, title: &str) -> i64 {
        let res = self
            .post(
                "/api/forums/threads",
                Some(cookie),
                json!({ "categoryId": 1, "title": title }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "create thread failed: {}", res.body);
        res.body["id"].as_i64().unwrap()
    }

    pub async fn reply(&self, cookie: &str, thread_id: i64, body: &str) -> TestResponse {
        self.post(
            &format!("/api/forums/threads/{}/posts", thread_id),
            Some(cookie),
            json!({ "body": body }),
        )
        .await
    }

    pub fn count(&self, sql: &str) -> i64 {
        let conn = self.db.get().unwrap();
        conn.query_row(sql, [], |r| r.get(0)).unwrap()
    }
}
