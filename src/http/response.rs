//! HTTP response building module
//!
//! Provides builders for the status responses the server sends. Every
//! response shares one boxed body type so buffered pages and streamed
//! downloads can come out of the same handler.

use crate::error::TransferError;
use crate::transfer::TransferPlan;
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::{Response, StatusCode};

/// Body type of every response
pub type ResponseBody = UnsyncBoxBody<Bytes, TransferError>;

pub type HttpResponse = Response<ResponseBody>;

/// Buffered body
pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Empty body
pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Build a plain-text response with the given status
pub fn build_text_response(status: StatusCode, text: &str) -> HttpResponse {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("X-Content-Type-Options", "nosniff")
        .body(full(text.to_string()))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(empty())
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> HttpResponse {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(allow: &str) -> HttpResponse {
    Response::builder()
        .status(405)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Allow", allow)
        .body(full("Method not allowed."))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(empty())
        })
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> HttpResponse {
    build_text_response(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload Too Large")
}

/// Build 503 response carrying the error text
pub fn build_503_response(message: &str) -> HttpResponse {
    build_text_response(StatusCode::SERVICE_UNAVAILABLE, message)
}

/// Build 302 redirect response
pub fn build_redirect_response(target: &str) -> HttpResponse {
    Response::builder()
        .status(302)
        .header("Location", target)
        .header("Content-Type", "text/plain")
        .body(full("Redirecting..."))
        .unwrap_or_else(|e| {
            log_build_error("302", &e);
            Response::new(empty())
        })
}

/// Build HTML page response, optionally setting a cookie
pub fn build_html_response(content: String, cookie: Option<&str>, is_head: bool) -> HttpResponse {
    let content_length = content.len();
    let body = if is_head { empty() } else { full(content) };

    let mut builder = Response::builder()
        .status(200)
        .header("Content-Type", "text/html; charset=utf-8")
        .header("Content-Length", content_length);
    if let Some(cookie) = cookie {
        builder = builder.header("Set-Cookie", cookie);
    }

    builder.body(body).unwrap_or_else(|e| {
        log_build_error("HTML", &e);
        Response::new(empty())
    })
}

/// Turn a download decision into the response written to the client
///
/// Headers go out once; the chunk stream becomes the body.
pub fn build_transfer_response(plan: TransferPlan) -> HttpResponse {
    let TransferPlan {
        status,
        headers,
        body,
        error,
    } = plan;

    if status == StatusCode::SERVICE_UNAVAILABLE {
        let message = error.map_or_else(|| "Service Unavailable".to_string(), |e| e.to_string());
        return build_503_response(&message);
    }

    let mut builder = Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(name, value);
    }

    let body = body.map_or_else(empty, BodyExt::boxed_unsync);
    builder.body(body).unwrap_or_else(|e| {
        log_build_error(status.as_str(), &e);
        Response::new(empty())
    })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
