//! Outgoing request normalisation
//!
//! In production every plain-HTTP URL is upgraded to HTTPS before it hits
//! the network. Rebuilding a request can fail (a navigation request cannot
//! carry an explicit mode, a GET cannot carry a body); the original request
//! is then issued unmodified.

use crate::config::Config;
use crate::fetch::{RequestDescriptor, RequestMode};
use tracing::{debug, warn};
use url::Url;

/// Rewrites requests before they are fetched
#[derive(Debug, Clone, Copy)]
pub struct RequestRewriter {
    production: bool,
}

impl RequestRewriter {
    pub fn new(production: bool) -> Self {
        Self { production }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.is_production())
    }

    pub fn is_production(&self) -> bool {
        self.production
    }

    /// Upgrade `http:` to `https:` in production; otherwise unchanged
    pub fn enforce_https(&self, url: &Url) -> Url {
        let mut upgraded = url.clone();
        if self.production && url.scheme() == "http" && upgraded.set_scheme("https").is_ok() {
            debug!("Upgraded {} to HTTPS", url);
        }
        upgraded
    }

    /// Rebuild a request with the upgraded URL.
    ///
    /// Method, headers, credentials, redirect policy and body carry over.
    /// Navigation requests are rebuilt without a mode.
    pub fn build_secure_request(&self, original: &RequestDescriptor) -> RequestDescriptor {
        let url = self.enforce_https(&original.url);

        let mut init = original.init();
        if original.mode == RequestMode::Navigate {
            init.mode = None;
        }

        match RequestDescriptor::construct(url, init) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rebuilding {} failed, sending original: {}", original, e);
                original.clone()
            }
        }
    }
}
