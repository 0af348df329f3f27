//! relaycache - request-interception cache layer
//!
//! Every outgoing request is classified by URL, routed to a per-class
//! strategy (cache-first, network-first, timeout race, network-only) and
//! answered from named, versioned stores or the network. Install seeds the
//! stores; activate deletes the ones an older version left behind.

pub mod background;
pub mod classify;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod rewrite;
pub mod store;
pub mod strategy;
pub mod ui;
pub mod worker;

#[cfg(test)]
mod testing;

pub use error::{RelayError, RelayResult};
pub use worker::{Worker, WorkerState};
