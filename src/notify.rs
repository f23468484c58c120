//! Push-notification token bookkeeping and the companion notify endpoint.

use crate::fetch::{HttpClient, send_json};
use crate::document::str_field;
use anyhow::Result;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Device tokens per user, in registration order without duplicates.
#[derive(Debug, Default, Clone)]
pub struct TokenRegistry {
    tokens: BTreeMap<String, Vec<String>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the token was already registered for the user or is
    /// blank.
    pub fn register(&mut self, user_id: &str, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() {
            return false;
        }
        let tokens = self.tokens.entry(user_id.to_string()).or_default();
        if tokens.iter().any(|t| t == token) {
            return false;
        }
        tokens.push(token.to_string());
        true
    }

    /// Removes `token` from every user; returns how many entries were dropped.
    pub fn unregister(&mut self, token: &str) -> usize {
        let mut removed = 0;
        self.tokens.retain(|_, tokens| {
            let before = tokens.len();
            tokens.retain(|t| t != token);
            removed += before - tokens.len();
            !tokens.is_empty()
        });
        removed
    }

    pub fn tokens_of(&self, user_id: &str) -> &[String] {
        self.tokens.get(user_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Tokens of all `users`, de-duplicated across users (a shared device
    /// should be notified once).
    pub fn tokens_for<'a>(&self, users: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for user in users {
            for token in self.tokens_of(user) {
                if !out.contains(token) {
                    out.push(token.clone());
                }
            }
        }
        out
    }

    /// Every registered token, de-duplicated.
    pub fn all_tokens(&self) -> Vec<String> {
        self.tokens_for(self.tokens.keys().map(String::as_str))
    }

    /// Number of distinct users with at least one token.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Tokens stored on a `users` document, from `pushTokens` and the older
/// single `fcmToken` field.
pub fn tokens_from_document(doc: &Value) -> Vec<String> {
    let mut tokens: Vec<String> = doc
        .get("pushTokens")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if let Some(single) = str_field(doc, &["fcmToken", "expoPushToken"]) {
        if !tokens.contains(&single) {
            tokens.push(single);
        }
    }
    tokens
}

/// Body posted to the notify endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub tokens: Vec<String>,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
}

/// Posts notifications to the companion HTTP endpoint that fans them out to
/// the messaging backend.
pub struct NotifyClient<C> {
    client: C,
    endpoint: String,
}

impl<C: HttpClient> NotifyClient<C> {
    pub fn new(client: C, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    /// Returns the number of tokens handed to the endpoint. Sending to no
    /// tokens is a no-op.
    #[tracing::instrument(skip(self, notification), fields(title = %notification.title, tokens = notification.tokens.len()))]
    pub async fn send(&self, notification: &Notification) -> Result<usize> {
        if notification.tokens.is_empty() {
            debug!("No push tokens, skipping notify call");
            return Ok(0);
        }

        let body = serde_json::to_value(notification)?;
        send_json(&self.client, Method::POST, &self.endpoint, Some(&body)).await?;

        info!("Notification handed to notify endpoint");
        Ok(notification.tokens.len())
    }
}
