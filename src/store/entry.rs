//! Stored entries

use crate::fetch::{Headers, Response, ResponseSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A captured response as it sits in a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub status: u16,
    pub headers: Headers,
    #[serde(with = "body_hex")]
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl Entry {
    /// Capture a response; the caller must hand over its own copy
    pub fn from_response(response: Response) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            stored_at: Utc::now(),
        }
    }

    /// Rebuild a response served from `store`
    pub fn into_response(self, store: &str) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
            source: ResponseSource::Cache {
                store: store.to_string(),
            },
        }
    }
}

mod body_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}
