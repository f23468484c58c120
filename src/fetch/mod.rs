mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result, anyhow};
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::Value;

/// Sends `body` as JSON and parses the JSON response.
///
/// Non-2xx responses become errors carrying the status and response text.
/// An empty response body parses as `Value::Null`.
pub async fn send_json<C: HttpClient + ?Sized>(
    client: &C,
    method: Method,
    url: &str,
    body: Option<&Value>,
) -> Result<Value> {
    let parsed = url
        .parse::<reqwest::Url>()
        .with_context(|| format!("invalid URL '{}'", strip_query(url)))?;
    let mut req = reqwest::Request::new(method.clone(), parsed);

    if let Some(body) = body {
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(serde_json::to_vec(body)?.into());
    }

    let resp = client
        .execute(req)
        .await
        .map_err(|e| anyhow!("Failed to send {} request: {}", method, e))?;

    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(anyhow!("{} {} returned status {}: {}", method, strip_query(url), status, text));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| anyhow!("Failed to parse response: {}", e))
}

pub async fn get_json<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Value> {
    send_json(client, Method::GET, url, None).await
}

/// Query strings may carry API keys; keep them out of error messages.
fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
