//! `http.request` action: issue a request and capture the response.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use super::ActionOutcome;
use crate::config::HttpConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Send the configured request. Any HTTP status counts as a successful
/// execution; only transport-level failures (connect, timeout, invalid
/// method/url) produce a failed outcome.
pub async fn execute(config: &HttpConfig) -> ActionOutcome {
    let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) else {
        return ActionOutcome::failure(json!({"error": "HTTP action requires a URL"}));
    };
    let Some(method) = config.method.as_deref().filter(|m| !m.trim().is_empty()) else {
        return ActionOutcome::failure(json!({"error": "HTTP action requires a method"}));
    };

    let method = match reqwest::Method::from_bytes(method.trim().to_uppercase().as_bytes()) {
        Ok(method) => method,
        Err(_) => {
            return ActionOutcome::failure(json!({
                "error": format!("Invalid HTTP method: {}", method),
            }))
        }
    };

    debug!(%method, url, "Executing HTTP action");

    let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            return ActionOutcome::failure(json!({
                "error": format!("Failed to build HTTP client: {}", e),
            }))
        }
    };

    let mut request = client.request(method, url);
    match &config.body {
        Some(Value::String(text)) => request = request.body(text.clone()),
        Some(Value::Null) | None => {}
        Some(other) => request = request.json(other),
    }

    match request.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            let headers: BTreeMap<String, String> = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect();
            let body = response.text().await.unwrap_or_default();
            ActionOutcome::success(json!({
                "status": status,
                "headers": headers,
                "body": body,
            }))
        }
        Err(e) => ActionOutcome::failure(json!({
            "error": format!("HTTP request failed: {}", e),
        })),
    }
}
