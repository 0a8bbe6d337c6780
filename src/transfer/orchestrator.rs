//! Download orchestration
//!
//! Combines metadata lookup, freshness, range parsing and the chunk streamer
//! into one response decision for a file download.

use crate::error::TransferError;
use crate::fs::FileRoot;
use crate::http::cache::{self, CACHE_CONTROL};
use crate::http::range::{parse_range_header, ByteRange};
use crate::logger;
use crate::transfer::cancel::CancellationSignal;
use crate::transfer::stream::{open_chunk_stream, ChunkStream};
use hyper::header::{self, HeaderName};
use hyper::StatusCode;
use std::io;

/// Inputs of a download, taken from the HTTP request
#[derive(Debug, Clone, Default)]
pub struct TransferRequest {
    /// Logical path relative to the served root
    pub path: String,
    pub range_header: Option<String>,
    pub if_modified_since: Option<String>,
    /// HEAD request: decide status and headers but send no body
    pub head_only: bool,
}

impl TransferRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range_header = Some(range.into());
        self
    }

    #[must_use]
    pub fn with_if_modified_since(mut self, since: impl Into<String>) -> Self {
        self.if_modified_since = Some(since.into());
        self
    }
}

/// Response decision for a download
#[derive(Debug)]
pub struct TransferPlan {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, String)>,
    /// File bytes to write after the headers
    pub body: Option<ChunkStream>,
    /// Failure reported before anything was sent
    pub error: Option<TransferError>,
}

impl TransferPlan {
    fn new(status: StatusCode, headers: Vec<(HeaderName, String)>) -> Self {
        Self {
            status,
            headers,
            body: None,
            error: None,
        }
    }

    fn failed(path: &str, error: TransferError) -> Self {
        logger::log_error(&format!("Download of '{path}' failed: {error}"));
        Self {
            status: error.status_code(),
            headers: Vec::new(),
            body: None,
            error: Some(error),
        }
    }

    fn unsatisfiable(mut headers: Vec<(HeaderName, String)>, size: u64, error: TransferError) -> Self {
        headers.push((header::CONTENT_RANGE, format!("bytes */{size}")));
        Self {
            status: error.status_code(),
            headers,
            body: None,
            error: Some(error),
        }
    }

    /// First value of header `name`
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of body bytes announced in `Content-Length`
    pub fn content_length(&self) -> u64 {
        self.header(&header::CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

/// Decide the response for `req` and open the streamer on the served window
///
/// | Condition | Status |
/// |-----------|--------|
/// | metadata lookup or open fails | 503 |
/// | `If-Modified-Since` after mtime | 304 |
/// | Range malformed or unsatisfiable | 416 |
/// | Range satisfiable | 206 |
/// | no Range | 200 |
pub async fn plan_transfer(
    root: &FileRoot,
    req: &TransferRequest,
    cancel: CancellationSignal,
) -> TransferPlan {
    let meta = match root.stat(&req.path).await {
        Ok(meta) => meta,
        Err(e) => return TransferPlan::failed(&req.path, e),
    };

    if meta.is_dir {
        let err = TransferError::IoFault(io::Error::other("is a directory"));
        return TransferPlan::failed(&req.path, err);
    }

    let mut headers = vec![
        (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
        (header::LAST_MODIFIED, cache::format_http_date(meta.modified_at)),
    ];

    // Freshness is decided before the range is looked at
    if cache::is_fresh(req.if_modified_since.as_deref(), meta.modified_at) {
        return TransferPlan::new(StatusCode::NOT_MODIFIED, headers);
    }

    let range = match parse_range_header(req.range_header.as_deref().unwrap_or(""), meta.size) {
        Ok(range) => range,
        Err(e) => return TransferPlan::unsatisfiable(headers, meta.size, e),
    };

    let (status, window) = match range {
        // Nothing to send; a zero length would also mean "to EOF" to the streamer
        Some(range) if range.length == 0 => {
            return TransferPlan::unsatisfiable(headers, meta.size, TransferError::RangeNotSatisfiable);
        }
        Some(range) => {
            headers.push((header::CONTENT_RANGE, range.content_range(meta.size)));
            (StatusCode::PARTIAL_CONTENT, range)
        }
        None => (StatusCode::OK, ByteRange::new(0, meta.size)),
    };

    headers.push((header::CONTENT_TYPE, meta.content_type().to_string()));
    headers.push((header::CONTENT_LENGTH, window.length.to_string()));
    headers.push((header::ACCEPT_RANGES, "bytes".to_string()));

    let mut plan = TransferPlan::new(status, headers);
    if req.head_only || window.length == 0 {
        return plan;
    }

    match open_chunk_stream(root, &req.path, window.start, window.length, cancel).await {
        Ok(stream) => plan.body = Some(stream),
        Err(e) => return TransferPlan::failed(&req.path, e),
    }
    plan
}
