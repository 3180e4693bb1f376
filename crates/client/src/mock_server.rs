//! In-process HTTP servers used by the client tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use percent_encoding::percent_decode_str;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A request as seen by a mock server.
#[derive(Debug)]
pub(crate) struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Starts a server that answers exactly one request and hands it back.
pub(crate) async fn respond_once(
    status: u16,
    body: &str,
) -> (String, JoinHandle<CapturedRequest>) {
    let (listener, url) = bind().await;
    let body = body.as_bytes().to_vec();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let req = read_request(&mut stream).await.unwrap();
        write_response(&mut stream, status, &body).await;
        req
    });

    (url, handle)
}

/// Starts a server that drops the first `failures` connections without
/// answering, then serves `body`. The handle yields the connection count.
pub(crate) async fn flaky_server(failures: usize, body: &str) -> (String, JoinHandle<usize>) {
    let (listener, url) = bind().await;
    let body = body.as_bytes().to_vec();

    let handle = tokio::spawn(async move {
        let mut accepted = 0;
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            accepted += 1;
            if accepted <= failures {
                drop(stream);
                continue;
            }
            if read_request(&mut stream).await.is_some() {
                write_response(&mut stream, 200, &body).await;
            }
            return accepted;
        }
    });

    (url, handle)
}

/// Returns a URL on which nothing is listening.
pub(crate) async fn closed_port_url() -> String {
    let (listener, url) = bind().await;
    drop(listener);
    url
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, format!("http://127.0.0.1:{port}"))
}

// ---------------------------------------------------------------------------
// Stateful fake of the storage service
// ---------------------------------------------------------------------------

struct StoredObject {
    content: Vec<u8>,
    uploaded_at: String,
    downloaded_at: Option<String>,
    consumed: bool,
}

struct State {
    api_key: Option<String>,
    objects: BTreeMap<String, StoredObject>,
}

/// Minimal in-memory implementation of the storage server's HTTP API.
pub(crate) struct FakeStorage {
    url: String,
    requests: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl FakeStorage {
    pub async fn spawn(api_key: Option<&str>) -> Self {
        let (listener, url) = bind().await;
        let state = Arc::new(Mutex::new(State {
            api_key: api_key.map(str::to_string),
            objects: BTreeMap::new(),
        }));
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();

        let handle = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let state = state.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    if let Some(req) = read_request(&mut stream).await {
                        counter.fetch_add(1, Ordering::SeqCst);
                        let (status, body) = route(&state, &req);
                        write_response(&mut stream, status, &body).await;
                    }
                });
            }
        });

        Self {
            url,
            requests,
            handle,
        }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for FakeStorage {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn json_response(status: u16, value: serde_json::Value) -> (u16, Vec<u8>) {
    (status, value.to_string().into_bytes())
}

fn route(state: &Mutex<State>, req: &CapturedRequest) -> (u16, Vec<u8>) {
    let mut state = state.lock().unwrap();
    let (raw_path, query) = req.path.split_once('?').unwrap_or((req.path.as_str(), ""));
    let path = percent_decode_str(raw_path).decode_utf8_lossy().into_owned();

    if path != "/health"
        && let Some(key) = &state.api_key
        && req.header("authorization") != Some(format!("Bearer {key}").as_str())
    {
        return json_response(401, json!({"error": "Unauthorized"}));
    }

    let now = chrono::Utc::now().to_rfc3339();

    match (req.method.as_str(), path.as_str()) {
        ("GET", "/health") => json_response(
            200,
            json!({"status": "ok", "service": "simple-storage", "timestamp": now}),
        ),
        ("POST", "/upload") => {
            let content_type = req.header("content-type").unwrap_or_default();
            let (job_id, content) = if content_type.starts_with("multipart/form-data") {
                parse_multipart(content_type, &req.body)
            } else {
                (
                    req.header("x-job-id").unwrap_or_default().to_string(),
                    req.body.clone(),
                )
            };
            if job_id.is_empty() {
                return json_response(400, json!({"error": "missing job_id"}));
            }
            let size = content.len();
            state.objects.insert(
                job_id.clone(),
                StoredObject {
                    content,
                    uploaded_at: now,
                    downloaded_at: None,
                    consumed: false,
                },
            );
            json_response(
                200,
                json!({
                    "status": "uploaded",
                    "job_id": job_id,
                    "file_size": size,
                    "download_url": format!("/download/{job_id}"),
                }),
            )
        }
        ("GET", p) if p.starts_with("/download/") => {
            let id = &p["/download/".len()..];
            let keep = query.split('&').any(|kv| kv == "keep=true");
            match state.objects.get_mut(id) {
                None => json_response(404, json!({"error": "not found"})),
                Some(obj) if obj.consumed => json_response(410, json!({"error": "gone"})),
                Some(obj) => {
                    obj.downloaded_at = Some(now);
                    if !keep {
                        obj.consumed = true;
                    }
                    (200, obj.content.clone())
                }
            }
        }
        ("DELETE", p) if p.starts_with("/delete/") => {
            let id = &p["/delete/".len()..];
            match state.objects.remove(id) {
                Some(obj) if !obj.consumed => json_response(200, json!({"status": "deleted"})),
                _ => json_response(404, json!({"error": "not found"})),
            }
        }
        ("GET", p) if p.starts_with("/check/") => {
            let id = &p["/check/".len()..];
            match state.objects.get(id) {
                Some(obj) if !obj.consumed => json_response(200, json!({"status": "exists"})),
                _ => json_response(404, json!({"error": "not found"})),
            }
        }
        ("GET", "/list") => {
            let files: Vec<_> = state
                .objects
                .iter()
                .map(|(id, obj)| {
                    json!({
                        "job_id": id,
                        "file_size": obj.content.len(),
                        "uploaded_at": obj.uploaded_at,
                        "downloaded_at": obj.downloaded_at,
                        "deleted": obj.consumed,
                    })
                })
                .collect();
            json_response(200, json!({ "files": files }))
        }
        ("POST", "/cleanup") => {
            let before = state.objects.len();
            state.objects.retain(|_, obj| !obj.consumed);
            json_response(200, json!({"deleted_count": before - state.objects.len()}))
        }
        _ => json_response(404, json!({"error": "no route"})),
    }
}

// ---------------------------------------------------------------------------
// HTTP/1.1 plumbing
// ---------------------------------------------------------------------------

async fn read_request(stream: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let lookup = |name: &str| {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };
    let chunked = lookup("transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked"));
    let content_length = lookup("content-length").and_then(|v| v.parse::<usize>().ok());

    let mut raw = buf[header_end..].to_vec();
    let body = if chunked {
        loop {
            if let Some(decoded) = decode_chunked(&raw) {
                break decoded;
            }
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            raw.extend_from_slice(&chunk[..n]);
        }
    } else {
        let len = content_length.unwrap_or(0);
        while raw.len() < len {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            raw.extend_from_slice(&chunk[..n]);
        }
        raw.truncate(len);
        raw
    };

    Some(CapturedRequest {
        method,
        path,
        headers,
        body,
    })
}

async fn write_response(stream: &mut TcpStream, status: u16, body: &[u8]) {
    let content_type = if body.first() == Some(&b'{') {
        "application/json"
    } else {
        "application/octet-stream"
    };
    let head = format!(
        "HTTP/1.1 {status} Mock\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(body).await;
    let _ = stream.shutdown().await;
}

/// Decodes a complete chunked body, or `None` if more bytes are needed.
fn decode_chunked(raw: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut rest = raw;
    loop {
        let line_end = find(rest, b"\r\n")?;
        let size_line = std::str::from_utf8(&rest[..line_end]).ok()?;
        let size = usize::from_str_radix(size_line.split(';').next()?.trim(), 16).ok()?;
        rest = &rest[line_end + 2..];
        if size == 0 {
            return Some(out);
        }
        if rest.len() < size + 2 {
            return None;
        }
        out.extend_from_slice(&rest[..size]);
        rest = &rest[size + 2..];
    }
}

/// Extracts `(job_id, file bytes)` from a multipart upload.
fn parse_multipart(content_type: &str, body: &[u8]) -> (String, Vec<u8>) {
    let boundary = content_type
        .split("boundary=")
        .nth(1)
        .unwrap_or_default()
        .trim_matches('"');
    let delimiter = format!("--{boundary}");

    let mut job_id = String::new();
    let mut file = Vec::new();

    for part in split(body, delimiter.as_bytes()) {
        let Some(header_end) = find(part, b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&part[..header_end]);
        let mut content = &part[header_end + 4..];
        if content.ends_with(b"\r\n") {
            content = &content[..content.len() - 2];
        }
        if headers.contains("name=\"job_id\"") {
            job_id = String::from_utf8_lossy(content).into_owned();
        } else if headers.contains("name=\"file\"") {
            file = content.to_vec();
        }
    }

    (job_id, file)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split<'a>(haystack: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut rest = haystack;
    while let Some(pos) = find(rest, delimiter) {
        parts.push(&rest[..pos]);
        rest = &rest[pos + delimiter.len()..];
    }
    parts.push(rest);
    parts
}
