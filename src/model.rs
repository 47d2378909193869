use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_LENGTH, HeaderMap, Request},
};
use bytes::Bytes;
use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::BasketError;

/// Header multimap: name to values, in the order they were received.
///
/// Names captured from an inbound request come back lowercase, since the
/// HTTP stack normalizes them before the record is built.
pub type Headers = BTreeMap<String, Vec<String>>;

/// Snapshot of a single captured HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Capture time in milliseconds since the Unix epoch.
    pub date: i64,
    pub headers: Headers,
    /// Declared content length, `-1` when the request did not declare one.
    pub content_length: i64,
    /// Raw body bytes, forwarded unchanged. Rendered as (lossy) text in JSON.
    #[serde(with = "body_text")]
    pub body: Bytes,
    pub method: String,
    pub path: String,
    pub query: String,
}

impl RequestRecord {
    /// Captures an inbound request, draining its body exactly once.
    ///
    /// A body that fails to read is recorded as empty; capture never fails
    /// because of it.
    pub async fn from_request(request: Request<Body>) -> Self {
        let (parts, body) = request.into_parts();

        let body = match to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %parts.uri.path(), "Failed to read request body: {}", e);
                Bytes::new()
            }
        };

        Self {
            date: chrono::Utc::now().timestamp_millis(),
            headers: copy_headers(&parts.headers),
            content_length: declared_content_length(&parts.headers),
            body,
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().unwrap_or_default().to_string(),
        }
    }
}

mod body_text {
    use super::*;

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        String::deserialize(deserializer).map(Bytes::from)
    }
}

fn copy_headers(headers: &HeaderMap) -> Headers {
    let mut copy = Headers::new();
    for (name, value) in headers {
        copy.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    copy
}

fn declared_content_length(headers: &HeaderMap) -> i64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(-1)
}

/// Per-basket configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketConfig {
    #[serde(default)]
    pub forward_url: String,
    #[serde(default)]
    pub insecure_tls: bool,
    #[serde(default)]
    pub expand_path: bool,
    pub capacity: usize,
}

impl BasketConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn with_forward_url(mut self, forward_url: &str) -> Self {
        self.forward_url = forward_url.to_string();
        self
    }

    pub fn with_expand_path(mut self, expand_path: bool) -> Self {
        self.expand_path = expand_path;
        self
    }

    pub fn with_insecure_tls(mut self, insecure_tls: bool) -> Self {
        self.insecure_tls = insecure_tls;
        self
    }

    pub fn validate(&self) -> Result<(), BasketError> {
        if self.capacity < 1 {
            return Err(BasketError::InvalidConfig(
                "capacity should be a positive number".to_string(),
            ));
        }
        if !self.forward_url.is_empty() && parse_forward_url(&self.forward_url).is_none() {
            return Err(BasketError::InvalidConfig(format!(
                "invalid forward URL: {}",
                self.forward_url
            )));
        }
        Ok(())
    }
}

/// Parses an absolute forward URL; relative references and URLs that cannot
/// carry a path (e.g. `mailto:`) are rejected.
pub(crate) fn parse_forward_url(raw: &str) -> Option<Url> {
    Url::parse(raw)
        .ok()
        .filter(|url| !url.cannot_be_a_base() && url.has_host())
}

/// Canned response returned to the sender of a captured request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
    /// Body must be rendered by an external template engine before sending.
    #[serde(default)]
    pub is_template: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketAuth {
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestsPage {
    pub requests: Vec<RequestRecord>,
    pub count: usize,
    pub total_count: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestsQueryPage {
    pub requests: Vec<RequestRecord>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketNamesPage {
    pub names: Vec<String>,
    pub count: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketNamesQueryPage {
    pub names: Vec<String>,
    pub has_more: bool,
}
