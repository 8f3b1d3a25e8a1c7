//! Stowaway - offline-first caching proxy
//!
//! Sits between a client application and the network. Static assets are
//! served cache-first from a versioned local cache, pages network-first
//! with a precached offline page as the fallback, and stale cache
//! versions are purged when a new version activates.

pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod network;
pub mod request;
pub mod server;
pub mod store;
pub mod strategy;
pub mod ui;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use error::{StowawayError, StowawayResult};
