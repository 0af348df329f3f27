//! Resource classification
//!
//! Every request gets exactly one class. Rules are checked in a fixed order
//! and the first match wins, so a font served from an allow-listed CDN is
//! `external-allowlisted`, never `font`.

use crate::config::{Config, StoreKind};
use crate::fetch::request::path_extension;
use crate::fetch::RequestDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};
use url::Url;

/// Category of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceClass {
    StaticAsset,
    Font,
    ExternalAllowlisted,
    TeamImage,
    GenericImage,
    Navigation,
    PaymentVendor,
    PaymentApi,
    Default,
}

impl ResourceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaticAsset => "static-asset",
            Self::Font => "font",
            Self::ExternalAllowlisted => "external-allowlisted",
            Self::TeamImage => "team-image",
            Self::GenericImage => "generic-image",
            Self::Navigation => "navigation",
            Self::PaymentVendor => "payment-vendor",
            Self::PaymentApi => "payment-api",
            Self::Default => "default",
        }
    }

    /// Store this class reads and writes; `None` means it is never cached
    pub fn store_kind(&self) -> Option<StoreKind> {
        match self {
            Self::StaticAsset | Self::Navigation | Self::Default => Some(StoreKind::Main),
            Self::Font => Some(StoreKind::Fonts),
            Self::GenericImage => Some(StoreKind::Images),
            Self::TeamImage => Some(StoreKind::TeamImages),
            Self::ExternalAllowlisted => Some(StoreKind::External),
            Self::PaymentVendor => Some(StoreKind::PaymentVendor),
            Self::PaymentApi => None,
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered-rule classifier built from configuration
#[derive(Debug, Clone)]
pub struct Classifier {
    external_prefixes: Vec<String>,
    external_hosts: Vec<String>,
    font_hosts: Vec<String>,
    font_extensions: Vec<String>,
    team_image_paths: Vec<String>,
    payment_vendor_hosts: Vec<String>,
    payment_api_paths: Vec<String>,
    image_extensions: Vec<String>,
    static_extensions: Vec<String>,
    seed_urls: HashSet<String>,
}

impl Classifier {
    pub fn from_config(config: &Config) -> Self {
        let classify = &config.classify;

        // Allow-list entries are either URL prefixes or bare hosts
        let (external_prefixes, external_hosts): (Vec<String>, Vec<String>) = classify
            .external_allowlist
            .iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .partition(|entry| entry.contains("://"));

        let mut seed_urls = HashSet::new();
        for seed in &config.seeds.main {
            match config.resolve(seed) {
                Ok(url) => {
                    seed_urls.insert(strip_fragment(url));
                }
                Err(e) => warn!("Ignoring main seed '{}' for classification: {}", seed, e),
            }
        }

        Self {
            external_prefixes,
            external_hosts: lowercase(&external_hosts),
            font_hosts: lowercase(&classify.font_hosts),
            font_extensions: extensions(&classify.font_extensions),
            team_image_paths: classify.team_image_paths.clone(),
            payment_vendor_hosts: lowercase(&classify.payment_vendor_hosts),
            payment_api_paths: classify.payment_api_paths.clone(),
            image_extensions: extensions(&classify.image_extensions),
            static_extensions: extensions(&classify.static_extensions),
            seed_urls,
        }
    }

    /// Assign the request its class
    pub fn classify(&self, request: &RequestDescriptor) -> ResourceClass {
        let class = self.classify_inner(request);
        debug!("Classified {} as {}", request, class);
        class
    }

    fn classify_inner(&self, request: &RequestDescriptor) -> ResourceClass {
        let url = &request.url;
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let path = url.path();
        let extension = path_extension(path);

        if self.is_external(url, &host) {
            return ResourceClass::ExternalAllowlisted;
        }

        if self.font_hosts.contains(&host) || matches_ext(&extension, &self.font_extensions) {
            return ResourceClass::Font;
        }

        if self.is_team_image_path(path) {
            return ResourceClass::TeamImage;
        }

        if self
            .payment_vendor_hosts
            .iter()
            .any(|vendor| host_matches(&host, vendor))
        {
            return ResourceClass::PaymentVendor;
        }

        if self
            .payment_api_paths
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
        {
            return ResourceClass::PaymentApi;
        }

        if request.is_navigation() {
            return ResourceClass::Navigation;
        }

        if matches_ext(&extension, &self.image_extensions) {
            return ResourceClass::GenericImage;
        }

        if matches_ext(&extension, &self.static_extensions)
            || self.seed_urls.contains(&strip_fragment(url.clone()))
        {
            return ResourceClass::StaticAsset;
        }

        ResourceClass::Default
    }

    /// Whether a URL lives under a team-image directory
    pub fn is_team_image(&self, url: &Url) -> bool {
        self.is_team_image_path(url.path())
    }

    fn is_team_image_path(&self, path: &str) -> bool {
        self.team_image_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    fn is_external(&self, url: &Url, host: &str) -> bool {
        let full = url.as_str();
        self.external_prefixes
            .iter()
            .any(|prefix| full.starts_with(prefix.as_str()))
            || self.external_hosts.iter().any(|h| h == host)
    }
}

/// Exact host or any subdomain of it
fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|rest| rest.ends_with('.'))
}

fn matches_ext(extension: &Option<String>, list: &[String]) -> bool {
    extension
        .as_ref()
        .is_some_and(|ext| list.iter().any(|candidate| candidate == ext))
}

fn strip_fragment(mut url: Url) -> String {
    url.set_fragment(None);
    url.to_string()
}

fn lowercase(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_ascii_lowercase()).collect()
}

fn extensions(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim_start_matches('.').to_ascii_lowercase())
        .collect()
}
