//! Error taxonomy for storage operations.

use std::path::PathBuf;

/// Errors from the Simple Storage client.
///
/// `NotFound` and `Gone` are authoritative answers from the server and may be
/// read as "absent". `ConnectionFailed` and `Unauthorized` mean the question
/// was never answered and must not be collapsed into "absent".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to Simple Storage Server at {url}")]
    ConnectionFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid or missing API key")]
    Unauthorized,

    #[error("job not found: {job_id}")]
    NotFound { job_id: String },

    #[error("file already deleted: {job_id}")]
    Gone { job_id: String },

    #[error("{message}")]
    Api {
        message: String,
        status: u16,
        body: String,
    },

    #[error("file not readable: {}", path.display())]
    FileNotReadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write to path: {}", path.display())]
    FileNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl Error {
    /// HTTP status that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::Gone { .. } => Some(410),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Job id the error refers to, for resource-scoped failures.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::NotFound { job_id } | Self::Gone { job_id } => Some(job_id),
            _ => None,
        }
    }

    /// Returns true when the server verified the object is not there.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Gone { .. })
    }

    /// Returns true when the server could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }
}
