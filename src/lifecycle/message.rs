//! Control messages from the host application

use super::LifecycleManager;
use crate::config::StoreKind;
use crate::error::{RelayError, RelayResult};
use crate::fetch::{RequestDescriptor, RequestMode};
use crate::strategy::alternate_format;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use url::Url;

/// Host to cache-layer message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    CacheImage {
        url: String,
    },
    CacheFont {
        url: String,
    },
    CacheExternal {
        url: String,
    },
    SkipWaiting,
    ClearCache {
        #[serde(rename = "cacheName")]
        cache_name: String,
    },
}

impl ControlMessage {
    /// Parse the JSON wire form
    pub fn parse(json: &str) -> RelayResult<Self> {
        serde_json::from_str(json).map_err(|e| RelayError::InvalidMessage(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::CacheImage { .. } => "CACHE_IMAGE",
            Self::CacheFont { .. } => "CACHE_FONT",
            Self::CacheExternal { .. } => "CACHE_EXTERNAL",
            Self::SkipWaiting => "SKIP_WAITING",
            Self::ClearCache { .. } => "CLEAR_CACHE",
        }
    }
}

/// What handling a message did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MessageOutcome {
    Cached {
        store: String,
        url: String,
        stored: bool,
        /// Set only for images: whether the other format was stored too
        #[serde(skip_serializing_if = "Option::is_none")]
        alternate_stored: Option<bool>,
    },
    Cleared {
        store: String,
        deleted: bool,
    },
    /// The worker has to activate; handled one level up
    SkipWaiting,
}

impl fmt::Display for MessageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached {
                store, url, stored, ..
            } => {
                if *stored {
                    write!(f, "cached {} in {}", url, store)
                } else {
                    write!(f, "could not cache {} in {}", url, store)
                }
            }
            Self::Cleared { store, deleted } => {
                if *deleted {
                    write!(f, "deleted store {}", store)
                } else {
                    write!(f, "store {} was not deleted", store)
                }
            }
            Self::SkipWaiting => write!(f, "skip waiting"),
        }
    }
}

impl LifecycleManager {
    /// Handle one control message
    pub async fn handle_message(&self, message: ControlMessage) -> RelayResult<MessageOutcome> {
        debug!("Handling {} message", message.kind());
        match message {
            ControlMessage::CacheImage { url } => self.cache_image(&url).await,
            ControlMessage::CacheFont { url } => {
                let url = parse_url(&url)?;
                self.cache_into(RequestDescriptor::get(url), StoreKind::Fonts)
                    .await
            }
            ControlMessage::CacheExternal { url } => {
                let url = parse_url(&url)?;
                let request = RequestDescriptor::get(url).with_mode(RequestMode::NoCors);
                self.cache_into(request, StoreKind::External).await
            }
            ControlMessage::SkipWaiting => Ok(MessageOutcome::SkipWaiting),
            ControlMessage::ClearCache { cache_name } => Ok(self.clear_cache(&cache_name).await),
        }
    }

    async fn cache_image(&self, url: &str) -> RelayResult<MessageOutcome> {
        let url = parse_url(url)?;
        let kind = if self.classifier.is_team_image(&url) {
            StoreKind::TeamImages
        } else {
            StoreKind::Images
        };

        let alternate = alternate_format(&url);
        let mut outcome = self.cache_into(RequestDescriptor::get(url), kind).await?;

        // Best effort; failure here never fails the message
        if let Some(alternate) = alternate {
            let store = self.ctx.store_name(kind);
            let stored = match self
                .ctx
                .fetch_and_store(&RequestDescriptor::get(alternate.clone()), &store)
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    debug!("Alternate {} not cached: {}", alternate, e);
                    false
                }
            };
            if let MessageOutcome::Cached {
                alternate_stored, ..
            } = &mut outcome
            {
                *alternate_stored = Some(stored);
            }
        }

        Ok(outcome)
    }

    async fn cache_into(
        &self,
        request: RequestDescriptor,
        kind: StoreKind,
    ) -> RelayResult<MessageOutcome> {
        let store = self.ctx.store_name(kind);
        let stored = match self.ctx.fetch_and_store(&request, &store).await {
            Ok(_) => {
                info!("Cached {} in {}", request.url, store);
                true
            }
            Err(e) => {
                warn!("Could not cache {} in {}: {}", request.url, store, e);
                false
            }
        };
        Ok(MessageOutcome::Cached {
            store,
            url: request.url.to_string(),
            stored,
            alternate_stored: None,
        })
    }

    async fn clear_cache(&self, name: &str) -> MessageOutcome {
        let deleted = match self.ctx.registry.delete_store(name).await {
            Ok(true) => {
                info!("Deleted store {}", name);
                true
            }
            Ok(false) => {
                warn!("Store {} did not exist", name);
                false
            }
            Err(e) => {
                warn!("Failed to delete store {}: {}", name, e);
                false
            }
        };
        MessageOutcome::Cleared {
            store: name.to_string(),
            deleted,
        }
    }
}

fn parse_url(url: &str) -> RelayResult<Url> {
    let parsed = Url::parse(url).map_err(|e| RelayError::InvalidMessage(format!("url '{}': {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RelayError::InvalidMessage(format!(
            "url '{}' is not http(s)",
            url
        )));
    }
    Ok(parsed)
}
