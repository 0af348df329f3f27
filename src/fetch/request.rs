//! Request descriptors
//!
//! Every inbound request is normalised once, at the dispatcher boundary, into
//! a `RequestDescriptor`. Requests the layer builds for itself go through
//! `RequestDescriptor::construct`, which enforces the same restrictions a
//! browser-style runtime does.

use crate::error::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Header map with lowercase names
pub type Headers = BTreeMap<String, String>;

/// Request mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level document navigation
    Navigate,
    /// Same-origin only
    SameOrigin,
    /// Opaque cross-origin
    NoCors,
    /// Regular cross-origin
    Cors,
}

/// Credential policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Credentials {
    Omit,
    SameOrigin,
    Include,
}

/// Redirect policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectPolicy {
    Follow,
    Error,
    Manual,
}

/// A normalised outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Uppercase method
    pub method: String,
    /// Absolute URL
    pub url: Url,
    /// Lowercase header names
    pub headers: Headers,
    pub mode: RequestMode,
    pub credentials: Credentials,
    pub redirect: RedirectPolicy,
    pub body: Vec<u8>,
}

/// Fields for constructing a request the layer issues itself
#[derive(Debug, Clone)]
pub struct RequestInit {
    pub method: String,
    pub headers: Headers,
    /// `None` lets the runtime pick its default (`cors`)
    pub mode: Option<RequestMode>,
    pub credentials: Credentials,
    pub redirect: RedirectPolicy,
    pub body: Vec<u8>,
}

impl RequestDescriptor {
    /// A plain GET request
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            headers: Headers::new(),
            mode: RequestMode::Cors,
            credentials: Credentials::SameOrigin,
            redirect: RedirectPolicy::Follow,
            body: Vec::new(),
        }
    }

    /// A top-level navigation, as the host issues it
    pub fn navigate(url: Url) -> Self {
        Self::get(url)
            .with_mode(RequestMode::Navigate)
            .with_header("accept", "text/html,application/xhtml+xml")
    }

    /// Parse a method and URL string
    pub fn parse(method: &str, url: &str) -> RelayResult<Self> {
        let url = Url::parse(url).map_err(|e| RelayError::UrlInvalid {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let mut request = Self::get(url);
        request.method = normalize_method(method)?;
        Ok(request)
    }

    /// Construct a request from init fields.
    ///
    /// Fails the way a fetch runtime does: `navigate` mode cannot be set
    /// explicitly, and GET/HEAD requests cannot carry a body.
    pub fn construct(url: Url, init: RequestInit) -> RelayResult<Self> {
        let method = normalize_method(&init.method)?;

        if init.mode == Some(RequestMode::Navigate) {
            return Err(RelayError::RequestConstruction(
                "mode 'navigate' cannot be set on a constructed request".to_string(),
            ));
        }

        if !init.body.is_empty() && matches!(method.as_str(), "GET" | "HEAD") {
            return Err(RelayError::RequestConstruction(format!(
                "{} request cannot have a body",
                method
            )));
        }

        Ok(Self {
            method,
            url,
            headers: init.headers,
            mode: init.mode.unwrap_or(RequestMode::Cors),
            credentials: init.credentials,
            redirect: init.redirect,
            body: init.body,
        })
    }

    /// Init fields mirroring this request
    pub fn init(&self) -> RequestInit {
        RequestInit {
            method: self.method.clone(),
            headers: self.headers.clone(),
            mode: Some(self.mode),
            credentials: self.credentials,
            redirect: self.redirect,
            body: self.body.clone(),
        }
    }

    /// Add a header (name is lowercased)
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Replace the mode
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Same request against a different URL
    pub fn with_url(&self, url: Url) -> Self {
        Self {
            url,
            ..self.clone()
        }
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// GET with an HTML accept header, or navigate mode
    pub fn is_navigation(&self) -> bool {
        if self.mode == RequestMode::Navigate {
            return true;
        }
        self.is_get()
            && self
                .header("accept")
                .is_some_and(|accept| accept.contains("text/html"))
    }

    /// URL path
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Lowercase extension of the last path segment
    pub fn extension(&self) -> Option<String> {
        path_extension(self.url.path())
    }
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Lowercase extension of the last segment of a URL path
pub fn path_extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn normalize_method(method: &str) -> RelayResult<String> {
    let method = method.trim();
    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic() || b == b'-') {
        return Err(RelayError::RequestConstruction(format!(
            "invalid method '{}'",
            method
        )));
    }
    Ok(method.to_ascii_uppercase())
}
