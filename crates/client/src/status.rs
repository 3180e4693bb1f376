//! Mapping of non-2xx HTTP responses onto [`Error`].
//!
//! Kept free of any transport types so the whole table can be exercised
//! without a server.

use crate::error::Error;

/// Storage operation a response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Health,
    Upload,
    Download,
    Delete,
    Exists,
    List,
    Cleanup,
}

impl Operation {
    /// Prefix used for generic failure messages.
    pub fn context(self) -> &'static str {
        match self {
            Self::Health => "Health check failed",
            Self::Upload => "Upload failed",
            Self::Download => "Download failed",
            Self::Delete => "Delete failed",
            Self::Exists => "Existence check failed",
            Self::List => "List failed",
            Self::Cleanup => "Cleanup failed",
        }
    }

    /// Whether a 404 on this operation means the addressed job is missing.
    fn not_found_is_resource(self) -> bool {
        matches!(self, Self::Download | Self::Delete | Self::Exists)
    }

    /// Whether a 410 on this operation means the addressed job was removed.
    fn gone_is_resource(self) -> bool {
        matches!(self, Self::Download | Self::Exists)
    }
}

/// Maps a non-success status to the matching error kind.
///
/// `job_id` is only consulted for resource-scoped operations; when absent,
/// 404/410 fall back to a generic [`Error::Api`].
pub fn error_for_status(op: Operation, job_id: Option<&str>, status: u16, body: &[u8]) -> Error {
    match (status, job_id) {
        (401, _) => Error::Unauthorized,
        (404, Some(id)) if op.not_found_is_resource() => Error::NotFound {
            job_id: id.to_string(),
        },
        (410, Some(id)) if op.gone_is_resource() => Error::Gone {
            job_id: id.to_string(),
        },
        _ => api_error(op, status, body),
    }
}

/// Builds a generic failure, pulling the `error` field out of a JSON body.
pub fn api_error(op: Operation, status: u16, body: &[u8]) -> Error {
    let detail = server_error_text(body).unwrap_or_else(|| "Unknown error".to_string());
    Error::Api {
        message: format!("{}: {detail}", op.context()),
        status,
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

fn server_error_text(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("error")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
