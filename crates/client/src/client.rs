//! Simple Storage HTTP client.
//!
//! Async HTTP client using `reqwest` with optional Bearer token
//! authentication and transport-level retries.

use std::fmt;
use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::backend::{BoxFuture, StorageBackend};
use crate::config::{StorageConfig, trim_base_url};
use crate::error::Error;
use crate::status::{Operation, api_error, error_for_status};
use crate::types::{FileInfo, HealthStatus, UploadResult, body_to_json, files_from_json};

/// Header carrying the job id on raw uploads.
pub const JOB_ID_HEADER: &str = "X-Job-Id";

/// Characters escaped when a job id is placed in the URL path.
///
/// `/` is left alone so hierarchical ids reach the server unchanged.
const JOB_ID_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'\\')
    .add(b'^')
    .add(b'|');

/// Simple Storage API client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    config: StorageConfig,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // StorageConfig's Debug already redacts the API key.
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client for the given configuration.
    pub fn new(config: StorageConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(Error::Build)?;

        let config = StorageConfig {
            base_url: trim_base_url(&config.base_url),
            ..config
        };

        Ok(Self { http, config })
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Points the client at another server (tests, overrides).
    pub fn set_base_url(&mut self, base_url: &str) -> &mut Self {
        self.config.base_url = trim_base_url(base_url);
        self
    }

    /// Replaces the API key. An empty key disables authentication.
    pub fn set_api_key(&mut self, api_key: &str) -> &mut Self {
        self.config.api_key = api_key.to_string();
        self
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Fetches the server health report. Sent without credentials.
    pub async fn health(&self) -> Result<HealthStatus, Error> {
        let body = self
            .execute(Operation::Health, None, || {
                self.request(Method::GET, "/health", false)
            })
            .await?;
        Ok(HealthStatus::from_json(&body_to_json(&body)))
    }

    /// Returns true when the server answers and reports `"ok"`.
    pub async fn is_healthy(&self) -> bool {
        match self.health().await {
            Ok(health) => health.is_healthy(),
            Err(e) => {
                debug!(error = %e, "health probe failed");
                false
            }
        }
    }

    /// Uploads a local file as a multipart attachment.
    ///
    /// The file is read before any request is made; an unreadable file fails
    /// with [`Error::FileNotReadable`] without touching the network.
    pub async fn upload(&self, job_id: &str, path: &Path) -> Result<UploadResult, Error> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|source| Error::FileNotReadable {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| job_id.to_string());

        debug!(job_id, file = %path.display(), size = content.len(), "uploading file");

        let body = self
            .execute(Operation::Upload, Some(job_id), || {
                let part = reqwest::multipart::Part::bytes(content.clone()).file_name(file_name.clone());
                let form = reqwest::multipart::Form::new()
                    .text("job_id", job_id.to_string())
                    .part("file", part);
                self.request(Method::POST, "/upload", true).multipart(form)
            })
            .await?;
        Ok(UploadResult::from_json(&body_to_json(&body)))
    }

    /// Uploads raw bytes, passing the job id in the `X-Job-Id` header.
    pub async fn upload_content(&self, job_id: &str, content: &[u8]) -> Result<UploadResult, Error> {
        debug!(job_id, size = content.len(), "uploading content");

        let body = self
            .execute(Operation::Upload, Some(job_id), || {
                self.request(Method::POST, "/upload", true)
                    .header(JOB_ID_HEADER, job_id)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(content.to_vec())
            })
            .await?;
        Ok(UploadResult::from_json(&body_to_json(&body)))
    }

    /// Downloads an object.
    ///
    /// With `keep == false` the server removes the object after this read, so
    /// a second download fails with [`Error::NotFound`] or [`Error::Gone`].
    pub async fn download(&self, job_id: &str, keep: bool) -> Result<Vec<u8>, Error> {
        let mut path = job_path("/download", job_id);
        if keep {
            path.push_str("?keep=true");
        }
        debug!(job_id, keep, "downloading");

        self.execute(Operation::Download, Some(job_id), || {
            self.request(Method::GET, &path, true)
        })
        .await
    }

    /// Downloads an object and writes it to `destination`.
    ///
    /// The parent directory is created first (mode 0755 on Unix). Local
    /// failures surface as [`Error::FileNotWritable`].
    pub async fn download_to(
        &self,
        job_id: &str,
        destination: &Path,
        keep: bool,
    ) -> Result<PathBuf, Error> {
        let not_writable = |source: std::io::Error| Error::FileNotWritable {
            path: destination.to_path_buf(),
            source,
        };

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).await.map_err(not_writable)?;
        }

        let content = self.download(job_id, keep).await?;
        tokio::fs::write(destination, &content)
            .await
            .map_err(not_writable)?;

        debug!(job_id, dest = %destination.display(), size = content.len(), "saved download");
        Ok(destination.to_path_buf())
    }

    /// Deletes an object. Deleting a missing id is an error, not a no-op.
    pub async fn delete(&self, job_id: &str) -> Result<bool, Error> {
        let path = job_path("/delete", job_id);
        debug!(job_id, "deleting");

        self.execute(Operation::Delete, Some(job_id), || {
            self.request(Method::DELETE, &path, true)
        })
        .await?;
        Ok(true)
    }

    /// Asks the server whether `job_id` is stored.
    ///
    /// Only an authoritative answer becomes `false`; transport, auth, and
    /// unexpected statuses are returned as errors.
    pub async fn exists(&self, job_id: &str) -> Result<bool, Error> {
        let path = job_path("/check", job_id);
        let (status, body) = self
            .exchange(|| self.request(Method::GET, &path, true))
            .await?;

        if status.is_success() {
            let json = body_to_json(&body);
            if json.get("status").and_then(serde_json::Value::as_str) == Some("exists") {
                return Ok(true);
            }
            // Only a 404/410 proves absence; an odd 2xx body proves nothing.
            return Err(api_error(Operation::Exists, status.as_u16(), &body));
        }

        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(false),
            other => Err(error_for_status(
                Operation::Exists,
                Some(job_id),
                other.as_u16(),
                &body,
            )),
        }
    }

    /// Lists every object on the server.
    pub async fn list(&self) -> Result<Vec<FileInfo>, Error> {
        let body = self
            .execute(Operation::List, None, || {
                self.request(Method::GET, "/list", true)
            })
            .await?;
        Ok(files_from_json(&body_to_json(&body)))
    }

    /// Runs server-side cleanup and returns the report untouched.
    pub async fn cleanup(&self) -> Result<serde_json::Value, Error> {
        let body = self
            .execute(Operation::Cleanup, None, || {
                self.request(Method::POST, "/cleanup", true)
            })
            .await?;
        Ok(body_to_json(&body))
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    fn request(&self, method: Method, path: &str, with_auth: bool) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url, path);
        debug!(%method, %url, "request");
        let req = self.http.request(method, url);
        if with_auth && !self.config.api_key.is_empty() {
            req.bearer_auth(&self.config.api_key)
        } else {
            req
        }
    }

    /// Runs a request and maps any non-2xx status to an error.
    async fn execute(
        &self,
        op: Operation,
        job_id: Option<&str>,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Vec<u8>, Error> {
        let (status, body) = self.exchange(build).await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(error_for_status(op, job_id, status.as_u16(), &body))
        }
    }

    /// Sends with retries and reads the full body.
    async fn exchange(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), Error> {
        let resp = self.send(build).await?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| self.connection_failed(e))?;
        Ok((status, body.to_vec()))
    }

    /// Sends a request, rebuilding it for each attempt.
    ///
    /// Only failures that happened before a response arrived are retried.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, Error> {
        let attempts = self.config.retry.attempts();
        let mut attempt = 1;

        loop {
            match build().send().await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < attempts && is_transient(&e) => {
                    warn!(attempt, attempts, error = %e, "transport error, retrying");
                    tokio::time::sleep(self.config.retry.delay()).await;
                    attempt += 1;
                }
                Err(e) => return Err(self.connection_failed(e)),
            }
        }
    }

    fn connection_failed(&self, source: reqwest::Error) -> Error {
        Error::ConnectionFailed {
            url: self.config.base_url.clone(),
            source,
        }
    }
}

impl StorageBackend for Client {
    fn health(&self) -> BoxFuture<'_, Result<HealthStatus, Error>> {
        Box::pin(Client::health(self))
    }

    fn is_healthy(&self) -> BoxFuture<'_, bool> {
        Box::pin(Client::is_healthy(self))
    }

    fn upload<'a>(
        &'a self,
        job_id: &'a str,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<UploadResult, Error>> {
        Box::pin(Client::upload(self, job_id, path))
    }

    fn upload_content<'a>(
        &'a self,
        job_id: &'a str,
        content: &'a [u8],
    ) -> BoxFuture<'a, Result<UploadResult, Error>> {
        Box::pin(Client::upload_content(self, job_id, content))
    }

    fn download<'a>(&'a self, job_id: &'a str, keep: bool) -> BoxFuture<'a, Result<Vec<u8>, Error>> {
        Box::pin(Client::download(self, job_id, keep))
    }

    fn download_to<'a>(
        &'a self,
        job_id: &'a str,
        destination: &'a Path,
        keep: bool,
    ) -> BoxFuture<'a, Result<PathBuf, Error>> {
        Box::pin(Client::download_to(self, job_id, destination, keep))
    }

    fn delete<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<bool, Error>> {
        Box::pin(Client::delete(self, job_id))
    }

    fn exists<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<bool, Error>> {
        Box::pin(Client::exists(self, job_id))
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<FileInfo>, Error>> {
        Box::pin(Client::list(self))
    }

    fn cleanup(&self) -> BoxFuture<'_, Result<serde_json::Value, Error>> {
        Box::pin(Client::cleanup(self))
    }
}

/// Builds `{prefix}/{job_id}` with the id percent-encoded.
fn job_path(prefix: &str, job_id: &str) -> String {
    format!("{prefix}/{}", utf8_percent_encode(job_id, JOB_ID_ENCODE_SET))
}

/// Whether the request failed before any response was received.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request()
}

async fn create_dir_all(dir: &Path) -> std::io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(dir).await
}
