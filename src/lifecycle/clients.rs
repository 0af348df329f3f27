//! Open application instances
//!
//! Each instance registers with the URL it is showing and gets a channel on
//! which the cache layer can post messages to it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Message posted from the cache layer to an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Navigate to the HTTPS equivalent of the current page
    UseHttps { url: String },
}

/// Snapshot of one registered instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: Uuid,
    pub url: Url,
    pub controlled: bool,
}

struct ClientHandle {
    info: ClientInfo,
    tx: mpsc::UnboundedSender<ClientMessage>,
}

/// Registry of instances
#[derive(Clone, Default)]
pub struct Clients {
    inner: Arc<Mutex<Vec<ClientHandle>>>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance showing `url`
    pub async fn register(&self, url: Url) -> (Uuid, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.inner.lock().await.push(ClientHandle {
            info: ClientInfo {
                id,
                url,
                controlled: false,
            },
            tx,
        });
        debug!("Registered client {}", id);
        (id, rx)
    }

    /// Take control of every live instance and return them
    pub async fn claim(&self) -> Vec<ClientInfo> {
        let mut clients = self.inner.lock().await;
        clients.retain(|c| !c.tx.is_closed());
        for client in clients.iter_mut() {
            client.info.controlled = true;
        }
        clients.iter().map(|c| c.info.clone()).collect()
    }

    /// Post a message; `false` if the instance is gone
    pub async fn post(&self, id: Uuid, message: ClientMessage) -> bool {
        let clients = self.inner.lock().await;
        clients
            .iter()
            .find(|c| c.info.id == id)
            .is_some_and(|c| c.tx.send(message).is_ok())
    }

    pub async fn list(&self) -> Vec<ClientInfo> {
        self.inner
            .lock()
            .await
            .iter()
            .map(|c| c.info.clone())
            .collect()
    }
}
