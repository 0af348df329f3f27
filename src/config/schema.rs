//! Configuration schema for relaycache
//!
//! Configuration is stored at `~/.config/relaycache/config.toml`. Every
//! section is optional; missing keys fall back to the defaults below.

use crate::error::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// The context the cache layer runs in
    pub origin: OriginConfig,

    /// Store naming and backend
    pub stores: StoresConfig,

    /// Resource classification patterns
    pub classify: ClassifyConfig,

    /// Install-time seed lists
    pub seeds: SeedsConfig,

    /// Speculative team-image pre-warm
    pub prewarm: PrewarmConfig,

    /// Network deadlines
    pub timeouts: TimeoutConfig,
}

impl Config {
    /// Check values that serde cannot
    pub fn validate(&self) -> RelayResult<()> {
        self.origin_url()?;
        if self.stores.prefix.is_empty() || self.stores.version.is_empty() {
            return Err(RelayError::User(
                "stores.prefix and stores.version must not be empty".to_string(),
            ));
        }
        if self.prewarm.concurrency == 0 {
            return Err(RelayError::User(
                "prewarm.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed origin URL
    pub fn origin_url(&self) -> RelayResult<Url> {
        let url = Url::parse(&self.origin.url).map_err(|e| RelayError::OriginInvalid {
            url: self.origin.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelayError::OriginInvalid {
                url: self.origin.url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(url)
    }

    /// Whether the running context counts as production.
    ///
    /// Anything not served from `localhost` or `127.0.0.1` is production.
    pub fn is_production(&self) -> bool {
        match self.origin_url() {
            Ok(url) => !matches!(url.host_str(), Some("localhost") | Some("127.0.0.1")),
            Err(_) => false,
        }
    }

    /// Versioned name of a store
    pub fn store_name(&self, kind: StoreKind) -> String {
        format!("{}-{}-{}", self.stores.prefix, kind, self.stores.version)
    }

    /// Names of every store that is current under this configuration
    pub fn version_set(&self) -> BTreeSet<String> {
        StoreKind::all()
            .iter()
            .map(|kind| self.store_name(*kind))
            .collect()
    }

    /// Resolve a configured path or URL against the origin
    pub fn resolve(&self, path_or_url: &str) -> RelayResult<Url> {
        let origin = self.origin_url()?;
        origin.join(path_or_url).map_err(|e| RelayError::UrlInvalid {
            url: path_or_url.to_string(),
            reason: e.to_string(),
        })
    }

    /// URL of the root document used for offline navigation
    pub fn root_document_url(&self) -> RelayResult<Url> {
        self.resolve(&self.origin.root_document)
    }
}

/// The store catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKind {
    /// App shell documents, scripts, styles and media
    Main,
    /// Font files
    Fonts,
    /// Generic images
    Images,
    /// Allow-listed third-party resources
    External,
    /// Team member portraits
    TeamImages,
    /// Payment vendor scripts
    PaymentVendor,
}

impl StoreKind {
    /// All store kinds in catalogue order
    pub fn all() -> &'static [Self] {
        &[
            Self::Main,
            Self::Fonts,
            Self::Images,
            Self::External,
            Self::TeamImages,
            Self::PaymentVendor,
        ]
    }

    /// Short name used inside versioned store names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Fonts => "fonts",
            Self::Images => "images",
            Self::External => "external",
            Self::TeamImages => "team-images",
            Self::PaymentVendor => "payment-vendor",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Running context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Location the cache layer is serving (drives the production predicate)
    pub url: String,

    /// Path of the document served to offline navigations
    pub root_document: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000/".to_string(),
            root_document: "/".to_string(),
        }
    }
}

/// Storage backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One directory per store under the state directory
    Disk,
    /// Process-local, lost on exit
    Memory,
}

/// Store naming and backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoresConfig {
    /// Prefix shared by every store name
    pub prefix: String,

    /// Version suffix; bumping it makes every older store stale
    pub version: String,

    /// Storage backend
    pub backend: BackendKind,

    /// Override for the disk backend root (defaults to the state dir)
    pub dir: Option<PathBuf>,

    /// Request headers folded into the cache key
    pub vary_headers: Vec<String>,
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            prefix: "relay".to_string(),
            version: "v1".to_string(),
            backend: BackendKind::Disk,
            dir: None,
            vary_headers: vec![],
        }
    }
}

/// Classification patterns, evaluated in a fixed rule order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// URL prefixes (or bare hosts) of allow-listed external resources
    pub external_allowlist: Vec<String>,

    /// Hosts that only serve fonts
    pub font_hosts: Vec<String>,

    /// Font file extensions
    pub font_extensions: Vec<String>,

    /// Path prefixes holding team images
    pub team_image_paths: Vec<String>,

    /// Payment vendor hosts (matched exactly or as a parent domain)
    pub payment_vendor_hosts: Vec<String>,

    /// Path fragments of the payment API
    pub payment_api_paths: Vec<String>,

    /// Image file extensions
    pub image_extensions: Vec<String>,

    /// Static asset extensions
    pub static_extensions: Vec<String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            external_allowlist: vec![
                "https://fonts.googleapis.com/".to_string(),
                "https://www.googletagmanager.com/".to_string(),
                "https://www.google-analytics.com/".to_string(),
                "https://cdnjs.cloudflare.com/".to_string(),
            ],
            font_hosts: vec!["fonts.gstatic.com".to_string()],
            font_extensions: to_strings(&["woff", "woff2", "ttf", "otf", "eot"]),
            team_image_paths: to_strings(&["/images/team/", "/assets/team/"]),
            payment_vendor_hosts: to_strings(&["stripe.com", "stripe.network", "paypal.com"]),
            payment_api_paths: to_strings(&[
                "/api/payment",
                "/api/checkout",
                "/api/create-payment-intent",
                "/api/webhook",
            ]),
            image_extensions: to_strings(&[
                "png", "jpg", "jpeg", "gif", "webp", "svg", "avif", "ico",
            ]),
            static_extensions: to_strings(&["js", "mjs", "css", "json", "mp4", "webm", "txt"]),
        }
    }
}

/// Install-time seed lists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedsConfig {
    /// App shell for the main store
    pub main: Vec<String>,

    /// Font files for the font store
    pub fonts: Vec<String>,
}

impl Default for SeedsConfig {
    fn default() -> Self {
        Self {
            main: to_strings(&[
                "/",
                "/index.html",
                "/css/styles.css",
                "/js/app.js",
                "/manifest.json",
                "/images/logo.png",
                "/videos/hero.mp4",
            ]),
            fonts: to_strings(&["/fonts/inter-regular.woff2", "/fonts/inter-bold.woff2"]),
        }
    }
}

/// Speculative team-image pre-warm
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrewarmConfig {
    /// Launch the pre-warm batch at install
    pub enabled: bool,

    /// Directory the team images live in
    pub team_image_dir: String,

    /// Name pattern; `{n}` is replaced by 1..=count
    pub name_pattern: String,

    /// How many names to generate from the pattern
    pub count: u32,

    /// Extra explicit names
    pub names: Vec<String>,

    /// Formats tried for every name
    pub formats: Vec<String>,

    /// Maximum simultaneous pre-warm fetches
    pub concurrency: usize,
}

impl Default for PrewarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            team_image_dir: "/images/team/".to_string(),
            name_pattern: "member-{n}".to_string(),
            count: 12,
            names: vec![],
            formats: to_strings(&["webp", "jpg"]),
            concurrency: 4,
        }
    }
}

impl PrewarmConfig {
    /// Paths of every likely team image
    pub fn candidate_paths(&self) -> Vec<String> {
        let dir = if self.team_image_dir.ends_with('/') {
            self.team_image_dir.clone()
        } else {
            format!("{}/", self.team_image_dir)
        };

        let names = (1..=self.count)
            .map(|n| self.name_pattern.replace("{n}", &n.to_string()))
            .chain(self.names.iter().cloned());

        let mut paths = Vec::new();
        for name in names {
            for format in &self.formats {
                paths.push(format!("{}{}.{}", dir, name, format));
            }
        }
        paths
    }
}

/// Network deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for the team-image network race
    pub team_image_ms: u64,

    /// Ceiling for any single network attempt
    pub fetch_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            team_image_ms: 3000,
            fetch_ms: 30_000,
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
