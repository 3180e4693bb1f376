//! Storage contract shared by the HTTP client and its consumers.
//!
//! The filesystem adapter talks to this trait instead of [`Client`] directly,
//! which keeps it testable with in-memory mocks.
//!
//! [`Client`]: crate::Client

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::error::Error;
use crate::types::{FileInfo, HealthStatus, UploadResult};

/// Boxed future returned by [`StorageBackend`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operations offered by a Simple Storage server.
pub trait StorageBackend: Send + Sync {
    /// Probes the server without credentials.
    fn health(&self) -> BoxFuture<'_, Result<HealthStatus, Error>>;

    /// Availability probe. Never fails; any error reads as `false`.
    fn is_healthy(&self) -> BoxFuture<'_, bool>;

    /// Uploads a local file under `job_id`.
    fn upload<'a>(
        &'a self,
        job_id: &'a str,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<UploadResult, Error>>;

    /// Uploads raw bytes under `job_id`.
    fn upload_content<'a>(
        &'a self,
        job_id: &'a str,
        content: &'a [u8],
    ) -> BoxFuture<'a, Result<UploadResult, Error>>;

    /// Fetches an object. Unless `keep` is set the server deletes it after
    /// this read.
    fn download<'a>(&'a self, job_id: &'a str, keep: bool) -> BoxFuture<'a, Result<Vec<u8>, Error>>;

    /// Fetches an object into `destination`, creating parent directories.
    fn download_to<'a>(
        &'a self,
        job_id: &'a str,
        destination: &'a Path,
        keep: bool,
    ) -> BoxFuture<'a, Result<PathBuf, Error>>;

    /// Removes an object. Absent objects yield [`Error::NotFound`].
    fn delete<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<bool, Error>>;

    /// Existence probe. `Ok(false)` only when the server confirmed absence.
    fn exists<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<bool, Error>>;

    /// Lists every stored object.
    fn list(&self) -> BoxFuture<'_, Result<Vec<FileInfo>, Error>>;

    /// Triggers server-side cleanup and returns its raw report.
    fn cleanup(&self) -> BoxFuture<'_, Result<serde_json::Value, Error>>;
}
