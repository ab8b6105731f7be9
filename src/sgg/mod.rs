//! Read-through proxy for the start.gg GraphQL API.

pub mod cache;
pub mod client;
pub mod queries;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

pub use cache::ResponseCache;
pub use client::HttpUpstream;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Start.gg request failed: {0}")]
    Transport(String),

    #[error("Start.gg error (status {status})")]
    Upstream { status: u16, errors: Vec<Value> },
}

impl ProxyError {
    /// Body sent to clients when a proxied call fails.
    pub fn to_payload(&self) -> Value {
        match self {
            ProxyError::Transport(message) => json!({
                "success": false,
                "message": message,
                "status": Value::Null,
                "errors": [],
            }),
            ProxyError::Upstream { status, errors } => json!({
                "success": false,
                "message": "Start.gg error",
                "status": status,
                "errors": errors,
            }),
        }
    }
}

/// Executes one GraphQL operation and yields its `data` member.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn execute(&self, query: &str, variables: &Value) -> Result<Value, ProxyError>;
}

/// Cache key for a query and its variables.
pub fn cache_key(query: &str, variables: &Value) -> String {
    json!({ "q": query, "v": variables }).to_string()
}

pub struct SggProxy {
    upstream: Arc<dyn Upstream>,
    cache: ResponseCache,
}

impl SggProxy {
    pub fn new(upstream: Arc<dyn Upstream>, ttl: Duration, max_entries: usize) -> Self {
        Self {
            upstream,
            cache: ResponseCache::new(ttl, max_entries),
        }
    }

    /// Answers from the cache when fresh, otherwise asks the upstream once
    /// per key no matter how many callers are waiting on it.
    pub async fn query(&self, query: &str, variables: Value) -> Result<Value, ProxyError> {
        let key = cache_key(query, &variables);
        self.cache
            .get_or_fetch(key, || async {
                tracing::debug!("start.gg cache miss");
                self.upstream.execute(query, &variables).await
            })
            .await
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}
