//! Network access abstraction
//!
//! Strategy executors only ever talk to the network through the `Fetcher`
//! trait, so tests can script outcomes and delays.

mod http;
pub mod request;
pub mod response;

pub use http::HttpFetcher;
pub use request::{
    path_extension, Credentials, Headers, RedirectPolicy, RequestDescriptor, RequestInit,
    RequestMode,
};
pub use response::{Response, ResponseSource};

use crate::error::RelayResult;
use async_trait::async_trait;

/// Abstract network interface
///
/// A rejected fetch (`Err`) means the network attempt itself failed; a
/// response with any status, including 4xx/5xx, is `Ok`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue a request
    async fn fetch(&self, request: &RequestDescriptor) -> RelayResult<Response>;

    /// Name for diagnostics
    fn name(&self) -> &'static str;
}
