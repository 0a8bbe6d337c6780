//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: extracts the request context,
//! validates the method, dispatches by path and writes the access log line.

use crate::config::AppState;
use crate::handler::{files, pages};
use crate::http::{self, HttpResponse};
use crate::logger::{self, AccessLogEntry};
use bytes::Bytes;
use http_body::Body;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::http::request::Parts;
use hyper::{Method, Request, Version};
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

const HSTS: &str = "max-age=31536000;";

/// Asset prefixes served from `files.assets_dir`
const ASSET_PREFIXES: [&str; 3] = ["/css/", "/js/", "/images/"];

/// Request context encapsulating information needed for request processing
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub path: String,
    /// Decoded query parameters, first occurrence wins
    pub query: HashMap<String, String>,
    pub is_head: bool,
    pub if_modified_since: Option<String>,
    pub range_header: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// Listing page the client last visited
    pub from_cookie: Option<String>,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        let headers = &parts.headers;
        Self {
            path: parts.uri.path().to_string(),
            query: parse_query(parts.uri.query().unwrap_or("")),
            is_head: parts.method == Method::HEAD,
            if_modified_since: header_string(headers, &header::IF_MODIFIED_SINCE),
            range_header: header_string(headers, &header::RANGE),
            content_type: header_string(headers, &header::CONTENT_TYPE),
            content_length: header_string(headers, &header::CONTENT_LENGTH)
                .and_then(|v| v.parse().ok()),
            from_cookie: cookie_value(headers, "from"),
        }
    }

    /// Non-empty query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Where to send the client after a delete or upload
    pub fn return_target(&self, dir: &str) -> String {
        self.from_cookie
            .clone()
            .unwrap_or_else(|| pages::list_url(dir, 0))
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<HttpResponse, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let ctx = RequestContext::from_parts(&parts);

    let mut entry = state.config.logging.access_log.then(|| {
        let mut entry = AccessLogEntry::new(
            peer_addr.ip().to_string(),
            parts.method.to_string(),
            ctx.path.clone(),
        );
        entry.query = parts.uri.query().map(ToString::to_string);
        entry.http_version = version_string(parts.version).to_string();
        entry.range.clone_from(&ctx.range_header);
        entry.referer = header_string(&parts.headers, &header::REFERER);
        entry.user_agent = header_string(&parts.headers, &header::USER_AGENT);
        entry
    });

    let response = route_request(&parts.method, &ctx, body, &state).await;

    if let Some(entry) = entry.as_mut() {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        entry.finish(started);
        logger::log_access(entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on path
async fn route_request<B>(
    method: &Method,
    ctx: &RequestContext,
    body: B,
    state: &Arc<AppState>,
) -> HttpResponse
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match ctx.path.as_str() {
        "/download" => match check_read_method(method) {
            Some(resp) => resp,
            None => files::serve_download(ctx, &state.root).await,
        },
        "/upload" => {
            if *method == Method::POST {
                files::upload_file(ctx, body, state).await
            } else {
                logger::log_warning(&format!("Method not allowed on /upload: {method}"));
                http::build_405_response("POST")
            }
        }
        "/test" => http::build_text_response(hyper::StatusCode::OK, "Hello\n"),
        "/list" | "/img" | "/video" | "/txt" | "/del" => {
            if let Some(resp) = check_read_method(method) {
                return resp;
            }
            match ctx.path.as_str() {
                "/list" => pages::serve_list(ctx, state).await,
                "/img" => pages::serve_image(ctx),
                "/video" => pages::serve_video(ctx),
                "/txt" => pages::serve_text(ctx, &state.root).await,
                _ => files::delete_file(ctx, &state.root).await,
            }
        }
        path if ASSET_PREFIXES.iter().any(|p| path.starts_with(p)) => {
            match check_read_method(method) {
                Some(resp) => resp,
                None => files::serve_asset(ctx, &state.assets).await,
            }
        }
        "/favicon.ico" => with_hsts(http::build_404_response()),
        _ => with_hsts(http::build_redirect_response("/list")),
    }
}

/// Reject anything but GET and HEAD
fn check_read_method(method: &Method) -> Option<HttpResponse> {
    match *method {
        Method::GET | Method::HEAD => None,
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response("GET, HEAD"))
        }
    }
}

fn with_hsts(mut response: HttpResponse) -> HttpResponse {
    response.headers_mut().insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static(HSTS),
    );
    response
}

/// Decode an `application/x-www-form-urlencoded` query string
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(decode_component(name))
            .or_insert_with(|| decode_component(value));
    }
    params
}

fn decode_component(s: &str) -> String {
    percent_decode_str(&s.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn header_string(headers: &HeaderMap, name: &header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Value of cookie `name` from any `Cookie` header
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

const fn version_string(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::{BodyExt, Full};
    use hyper::StatusCode;
    use tempfile::TempDir;

    fn state_for(tmp: &TempDir) -> Arc<AppState> {
        let mut config = Config::load_from("/nonexistent/fileserver-config").unwrap();
        config.files.root = tmp.path().join("files").to_string_lossy().into_owned();
        config.files.assets_dir = tmp.path().join("assets").to_string_lossy().into_owned();
        config.logging.access_log = false;
        std::fs::create_dir_all(tmp.path().join("files")).unwrap();
        std::fs::create_dir_all(tmp.path().join("assets/css")).unwrap();
        Arc::new(AppState::new(config))
    }

    async fn send(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> HttpResponse {
        let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        handle_request(req, Arc::clone(state), peer).await.unwrap()
    }

    fn get(uri: &str) -> Request<Full<Bytes>> {
        Request::get(uri).body(Full::new(Bytes::new())).unwrap()
    }

    async fn body_of(response: HttpResponse) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[test]
    fn test_parse_query() {
        let q = parse_query("path=my+docs%2Fa%20b.txt&p=2&p=3&flag");
        assert_eq!(q["path"], "my docs/a b.txt");
        assert_eq!(q["p"], "2");
        assert_eq!(q["flag"], "");
    }

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; from=/list?path=docs&p=1"),
        );
        assert_eq!(
            cookie_value(&headers, "from").as_deref(),
            Some("/list?path=docs&p=1")
        );
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[tokio::test]
    async fn test_root_redirects_to_list_with_hsts() {
        let tmp = TempDir::new().unwrap();
        let state = state_for(&tmp);

        let response = send(&state, get("/")).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/list");
        assert_eq!(response.headers()["strict-transport-security"], HSTS);

        let favicon = send(&state, get("/favicon.ico")).await;
        assert_eq!(favicon.status(), StatusCode::NOT_FOUND);
        assert_eq!(favicon.headers()["strict-transport-security"], HSTS);
    }

    #[tokio::test]
    async fn test_hello() {
        let tmp = TempDir::new().unwrap();
        let state = state_for(&tmp);
        let response = send(&state, get("/test")).await;
        assert_eq!(body_of(response).await, "Hello\n");
    }

    #[tokio::test]
    async fn test_download_with_range() {
        let tmp = TempDir::new().unwrap();
        let state = state_for(&tmp);
        std::fs::write(tmp.path().join("files/clip.mp4"), b"abcdefghij").unwrap();

        let req = Request::get("/download?path=clip.mp4")
            .header("Range", "bytes=-3")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = send(&state, req).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()["content-range"], "bytes 7-9/10");
        assert_eq!(response.headers()["content-type"], "video/mp4");
        assert_eq!(body_of(response).await, "hij");
    }

    #[tokio::test]
    async fn test_download_rejects_post() {
        let tmp = TempDir::new().unwrap();
        let state = state_for(&tmp);
        let req = Request::post("/download?path=x")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = send(&state, req).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()["allow"], "GET, HEAD");
    }

    #[tokio::test]
    async fn test_upload_requires_post() {
        let tmp = TempDir::new().unwrap();
        let state = state_for(&tmp);
        let response = send(&state, get("/upload")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_of(response).await, "Method not allowed.");
    }

    #[tokio::test]
    async fn test_asset_served_from_assets_dir() {
        let tmp = TempDir::new().unwrap();
        let state = state_for(&tmp);
        std::fs::write(tmp.path().join("assets/css/site.css"), b"body{}").unwrap();

        let response = send(&state, get("/css/site.css")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/css; charset=utf-8");
        assert_eq!(body_of(response).await, "body{}");

        let missing = send(&state, get("/js/app.js")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
