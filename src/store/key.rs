//! Request identity used as the store key

use crate::fetch::RequestDescriptor;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Method + normalised URL, optionally + vary-relevant header values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vary: Option<String>,
}

impl CacheKey {
    /// Key for a method and URL; the fragment never takes part in identity
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.to_ascii_uppercase(),
            url: url.into(),
            vary: None,
        }
    }

    /// GET key for a URL
    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }

    /// Key for a request, folding in the listed header values
    pub fn for_request(request: &RequestDescriptor, vary_headers: &[String]) -> Self {
        let mut key = Self::new(&request.method, &request.url);
        if !vary_headers.is_empty() {
            let vary = vary_headers
                .iter()
                .map(|name| {
                    let name = name.to_ascii_lowercase();
                    let value = request.header(&name).unwrap_or_default();
                    format!("{}={}", name, value)
                })
                .collect::<Vec<_>>()
                .join(";");
            key.vary = Some(vary);
        }
        key
    }

    /// Copy of this key with the vary part of another request
    pub fn with_vary(mut self, vary: Option<String>) -> Self {
        self.vary = vary;
        self
    }

    /// SHA-256 of the identity, hex encoded; stable across runs
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        if let Some(vary) = &self.vary {
            hasher.update(b"\n");
            hasher.update(vary.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.vary {
            Some(vary) => write!(f, "{} {} [{}]", self.method, self.url, vary),
            None => write!(f, "{} {}", self.method, self.url),
        }
    }
}
