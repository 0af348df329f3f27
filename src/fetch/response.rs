//! Captured responses and synthetic placeholders

use crate::fetch::request::Headers;
use std::borrow::Cow;
use std::fmt;

/// Where a response came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSource {
    /// Fresh from the network
    Network,
    /// Served from a named store
    Cache { store: String },
    /// Built locally as a fallback
    Synthetic,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Cache { store } => write!(f, "cache:{}", store),
            Self::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// A fully buffered response.
///
/// The body is owned, so handing one copy to a store and another to the
/// caller requires an explicit `clone()` before either is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl Response {
    /// A network response
    pub fn new(status: u16, headers: Headers, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            source: ResponseSource::Network,
        }
    }

    /// A locally built response
    pub fn synthetic(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        let mut headers = Headers::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        headers.insert("x-relaycache".to_string(), "synthetic".to_string());
        Self {
            status,
            headers,
            body: body.into(),
            source: ResponseSource::Synthetic,
        }
    }

    /// 404 placeholder
    pub fn not_found() -> Self {
        Self::synthetic(404, "text/plain; charset=utf-8", "Not Found")
    }

    /// Generic network-failure placeholder
    pub fn network_error() -> Self {
        Self::synthetic(503, "text/plain; charset=utf-8", "Network error")
    }

    /// Dispatcher catch-all
    pub fn internal_error() -> Self {
        Self::synthetic(500, "text/plain; charset=utf-8", "Internal error")
    }

    /// Navigation failure without a cached root document
    pub fn offline_page() -> Self {
        Self::synthetic(
            503,
            "text/html; charset=utf-8",
            "<!DOCTYPE html><html><head><title>Offline</title></head>\
             <body><h1>You are offline</h1>\
             <p>This page is not available offline. Check your connection and try again.</p>\
             </body></html>",
        )
    }

    /// Empty script so a missing third-party script does not break the page
    pub fn empty_script() -> Self {
        Self::synthetic(200, "application/javascript; charset=utf-8", "")
    }

    /// Empty stylesheet carrying only a comment
    pub fn empty_stylesheet() -> Self {
        Self::synthetic(200, "text/css; charset=utf-8", "/* offline */")
    }

    /// Structured error for unreachable payment endpoints
    pub fn payment_unavailable() -> Self {
        let body = serde_json::json!({
            "error": "network_unavailable",
            "message": "The payment service could not be reached. Check your connection and try again.",
            "retryable": true,
        });
        Self::synthetic(503, "application/json", body.to_string())
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn is_from_cache(&self) -> bool {
        matches!(self.source, ResponseSource::Cache { .. })
    }
}
