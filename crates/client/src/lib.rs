//! Async client for the Simple Storage Server.
//!
//! The server keeps opaque blobs under caller-chosen job ids. Objects are
//! consumed on read unless the download asks to keep them. [`Client`] maps
//! every endpoint to a typed method and every failure to an [`Error`]
//! variant; [`StorageBackend`] abstracts those methods for consumers that
//! want to swap in a test double.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod status;
pub mod types;

#[cfg(test)]
mod mock_server;

pub use backend::{BoxFuture, StorageBackend};
pub use client::Client;
pub use config::{ConfigError, RetryPolicy, StorageConfig};
pub use error::Error;
pub use status::Operation;
pub use types::{FileInfo, HealthStatus, UploadResult};
