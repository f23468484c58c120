//! Credential wrappers around an [`HttpClient`].

use crate::fetch::client::HttpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

/// Sets one header on every request, e.g. `Authorization: Bearer <id token>`.
///
/// The header is validated once at construction.
pub struct HeaderAuth<C> {
    inner: C,
    name: HeaderName,
    value: HeaderValue,
}

impl<C> HeaderAuth<C> {
    pub fn new(inner: C, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name '{name}'"))?;
        let mut value = HeaderValue::from_str(value).context("invalid header value")?;
        value.set_sensitive(true);
        Ok(Self { inner, name, value })
    }

    /// `Authorization: Bearer <token>`, used with Firebase ID tokens.
    pub fn bearer(inner: C, token: &str) -> Result<Self> {
        Self::new(inner, AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for HeaderAuth<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut().insert(self.name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}

/// Appends `<param>=<key>` to every request URL. Firestore's REST API takes
/// the project's web API key as `key`.
pub struct QueryKey<C> {
    inner: C,
    param: String,
    key: String,
}

impl<C> QueryKey<C> {
    pub fn new(inner: C, param: &str, key: &str) -> Self {
        Self {
            inner,
            param: param.to_string(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for QueryKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.url_mut()
            .query_pairs_mut()
            .append_pair(&self.param, &self.key);
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::fake::FakeClient;
    use crate::fetch::get_json;

    #[tokio::test]
    async fn test_wrappers_decorate_request() {
        let fake = FakeClient::new(vec![(200, "{}".to_string())]);
        let client = QueryKey::new(HeaderAuth::bearer(fake.clone(), "tok").unwrap(), "key", "abc");

        get_json(&client, "https://example.test/docs?x=1").await.unwrap();

        let sent = fake.requests();
        assert_eq!(sent[0].url, "https://example.test/docs?x=1&key=abc");
        assert_eq!(sent[0].authorization.as_deref(), Some("Bearer tok"));
    }

    #[test]
    fn test_invalid_header_rejected() {
        assert!(HeaderAuth::new((), "bad header", "v").is_err());
        assert!(HeaderAuth::new((), "x-api-key", "line\nbreak").is_err());
    }
}
