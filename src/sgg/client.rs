use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{ProxyError, Upstream};

/// Talks to the real start.gg endpoint with a bearer token.
pub struct HttpUpstream {
    client: Client,
    endpoint: String,
    token: String,
}

impl HttpUpstream {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn execute(&self, query: &str, variables: &Value) -> Result<Value, ProxyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| ProxyError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProxyError::Transport(e.to_string()))?;

        interpret(status.as_u16(), status.is_success(), &text)
    }
}

/// Turns a raw GraphQL response into its `data` or a [`ProxyError`].
fn interpret(status: u16, ok: bool, text: &str) -> Result<Value, ProxyError> {
    let payload: Value = serde_json::from_str(text).unwrap_or_else(|_| {
        json!({ "errors": [{ "message": "Invalid JSON from Start.gg", "body": text }] })
    });

    let errors = payload.get("errors").filter(|e| !e.is_null());
    if !ok || errors.is_some() {
        let errors = match errors {
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
            None => Vec::new(),
        };
        return Err(ProxyError::Upstream { status, errors });
    }

    Ok(payload.get("data").cloned().unwrap_or(Value::Null))
}
