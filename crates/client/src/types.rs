//! Response types for the Simple Storage API.
//!
//! Every type here is built with [`from_json`](HealthStatus::from_json) style
//! constructors that never fail: missing or malformed fields fall back to the
//! documented defaults instead of rejecting the whole response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Health status reported by `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default = "unknown", deserialize_with = "lenient_string_or_unknown")]
    pub status: String,
    #[serde(default = "unknown", deserialize_with = "lenient_string_or_unknown")]
    pub service: String,
    #[serde(default = "now_rfc3339", deserialize_with = "lenient_timestamp")]
    pub timestamp: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: unknown(),
            service: unknown(),
            timestamp: now_rfc3339(),
        }
    }
}

impl HealthStatus {
    /// Builds a health status from a response body.
    pub fn from_json(value: &serde_json::Value) -> Self {
        parse_or_default(value)
    }

    /// True when the server reports `"ok"`.
    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

/// Result of an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    #[serde(default = "unknown", deserialize_with = "lenient_string_or_unknown")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub job_id: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub file_size: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub download_url: String,
}

impl Default for UploadResult {
    fn default() -> Self {
        Self {
            status: unknown(),
            job_id: String::new(),
            file_size: 0,
            download_url: String::new(),
        }
    }
}

impl UploadResult {
    /// Builds an upload result from a response body.
    pub fn from_json(value: &serde_json::Value) -> Self {
        parse_or_default(value)
    }

    /// True when the server stored the object.
    pub fn is_successful(&self) -> bool {
        self.status == "uploaded"
    }
}

/// One entry of `GET /list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub job_id: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub file_size: u64,
    #[serde(default = "Utc::now", deserialize_with = "lenient_datetime")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_opt_datetime")]
    pub downloaded_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub deleted: bool,
}

impl Default for FileInfo {
    fn default() -> Self {
        Self {
            job_id: String::new(),
            file_size: 0,
            uploaded_at: Utc::now(),
            downloaded_at: None,
            deleted: false,
        }
    }
}

impl FileInfo {
    /// Builds file info from one element of the `files` array.
    pub fn from_json(value: &serde_json::Value) -> Self {
        parse_or_default(value)
    }

    /// True while the object can still be downloaded.
    pub fn is_available(&self) -> bool {
        !self.deleted
    }

    /// True once the object has been fetched at least once.
    pub fn has_been_downloaded(&self) -> bool {
        self.downloaded_at.is_some()
    }
}

/// Extracts the `files` array of a list response.
///
/// Entries that are not JSON objects carry no job id and are skipped.
pub(crate) fn files_from_json(value: &serde_json::Value) -> Vec<FileInfo> {
    value
        .get("files")
        .and_then(serde_json::Value::as_array)
        .map(|files| {
            files
                .iter()
                .filter(|f| f.is_object())
                .map(FileInfo::from_json)
                .collect()
        })
        .unwrap_or_default()
}

/// Parses a response body into JSON, treating anything unparseable as `{}`.
pub(crate) fn body_to_json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
}

fn parse_or_default<T>(value: &serde_json::Value) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    if !value.is_object() {
        return T::default();
    }
    T::deserialize(value).unwrap_or_default()
}

fn unknown() -> String {
    "unknown".to_string()
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

// ---------------------------------------------------------------------------
// Lenient field deserializers. Each accepts any JSON value and never errors.
// ---------------------------------------------------------------------------

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(string_or(value, String::new))
}

fn lenient_string_or_unknown<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(string_or(value, unknown))
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(string_or(value, now_rfc3339))
}

/// Stringifies `value`; `null` yields the field default.
fn string_or(value: serde_json::Value, default: fn() -> String) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => default(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64))
                .unwrap_or(0)
        }
        serde_json::Value::Bool(b) => u64::from(b),
        _ => 0,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => matches!(s.trim(), "1" | "true" | "TRUE" | "True"),
        _ => false,
    })
}

fn lenient_datetime<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(parse_datetime(&value).unwrap_or_else(Utc::now))
}

fn lenient_opt_datetime<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(parse_datetime(&value))
}

/// Accepts RFC 3339, naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` (read as UTC),
/// or a Unix timestamp in seconds.
fn parse_datetime(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}
