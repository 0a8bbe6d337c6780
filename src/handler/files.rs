//! File operations: download, page assets, delete and upload

use crate::config::AppState;
use crate::error::{TransferError, UploadError};
use crate::fs::FileRoot;
use crate::handler::pages;
use crate::handler::router::RequestContext;
use crate::http::{self, HttpResponse};
use crate::logger;
use crate::transfer::{plan_transfer, CancellationSignal, TransferRequest};
use bytes::Bytes;
use http_body::Body;
use http_body_util::BodyExt;
use std::error::Error as StdError;
use std::sync::Arc;

fn transfer_request(ctx: &RequestContext, path: &str) -> TransferRequest {
    TransferRequest {
        path: path.to_string(),
        range_header: ctx.range_header.clone(),
        if_modified_since: ctx.if_modified_since.clone(),
        head_only: ctx.is_head,
    }
}

/// `/download?path=`
///
/// The response body owns the transfer; hyper drops it when the client goes
/// away, which stops the producer.
pub async fn serve_download(ctx: &RequestContext, root: &FileRoot) -> HttpResponse {
    let path = ctx.param("path").unwrap_or("");
    let plan = plan_transfer(root, &transfer_request(ctx, path), CancellationSignal::new()).await;
    http::build_transfer_response(plan)
}

/// `/css/`, `/js/` and `/images/` files, resolved under the assets directory
pub async fn serve_asset(ctx: &RequestContext, assets: &FileRoot) -> HttpResponse {
    let req = transfer_request(ctx, ctx.path.trim_start_matches('/'));
    let plan = plan_transfer(assets, &req, CancellationSignal::new()).await;
    if matches!(plan.error, Some(TransferError::NotFound(_))) {
        return http::build_404_response();
    }
    http::build_transfer_response(plan)
}

/// `/del?path=[&confirm=yes]`
pub async fn delete_file(ctx: &RequestContext, root: &FileRoot) -> HttpResponse {
    let Some(path) = ctx.param("path") else {
        return http::build_redirect_response("/list");
    };

    if ctx.param("confirm") != Some("yes") {
        return http::build_html_response(pages::render_delete(path), None, ctx.is_head);
    }

    match root.delete(path).await {
        Ok(()) => {
            logger::log_info(&format!("[Delete] Removed {path}"));
            http::build_redirect_response(&ctx.return_target(crate::fs::parent_path(path)))
        }
        Err(e) => {
            logger::log_error(&format!("Delete of '{path}' failed: {e}"));
            http::build_503_response(&e.to_string())
        }
    }
}

/// `POST /upload?path=` with a multipart `file` field
pub async fn upload_file<B>(ctx: &RequestContext, body: B, state: &Arc<AppState>) -> HttpResponse
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let dir = ctx.param("path").unwrap_or("").to_string();

    match save_upload(ctx, body, &dir, state).await {
        Ok(saved) => {
            logger::log_info(&format!("[Upload] Saved {saved}"));
            http::build_redirect_response(&ctx.return_target(&dir))
        }
        Err(UploadError::TooLarge(limit)) => {
            logger::log_warning(&format!("Upload rejected: body exceeds {limit} bytes"));
            http::build_413_response()
        }
        Err(e) => {
            logger::log_error(&format!("Upload to '{dir}' failed: {e}"));
            http::build_503_response(&e.to_string())
        }
    }
}

/// Store the first `file` field in `dir`; returns the stored logical path
///
/// The target is replaced only once the whole field has been received.
async fn save_upload<B>(
    ctx: &RequestContext,
    body: B,
    dir: &str,
    state: &Arc<AppState>,
) -> Result<String, UploadError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let limit = state.config.files.upload_limit;
    if ctx.content_length.is_some_and(|len| len > limit) {
        return Err(UploadError::TooLarge(limit));
    }

    let boundary = multer::parse_boundary(ctx.content_type.as_deref().unwrap_or(""))?;
    let constraints = multer::Constraints::new()
        .size_limit(multer::SizeLimit::new().whole_stream(limit));
    let mut multipart =
        multer::Multipart::with_constraints(body.into_data_stream(), boundary, constraints);

    let mut dir = dir.to_string();
    while let Some(mut field) = multipart.next_field().await.map_err(limit_error)? {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("path") => dir = field.text().await.map_err(limit_error)?,
            Some("file") => {
                let file_name = field.file_name().unwrap_or("").to_string();
                // Early returns drop `pending`, which discards the partial file
                let mut pending = state.root.create(&dir, &file_name).await?;
                while let Some(chunk) = field.chunk().await.map_err(limit_error)? {
                    pending.write_all(&chunk).await?;
                }
                return Ok(pending.commit().await?);
            }
            _ => {}
        }
    }

    Err(UploadError::MissingFile)
}

fn limit_error(err: multer::Error) -> UploadError {
    match err {
        multer::Error::StreamSizeExceeded { limit } => UploadError::TooLarge(limit),
        other => UploadError::Multipart(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handler::router::parse_query;
    use http_body::Frame;
    use http_body_util::Full;
    use hyper::StatusCode;
    use std::collections::VecDeque;
    use std::convert::Infallible;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{ready, Context, Poll};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::{sleep, Sleep};

    const BOUNDARY: &str = "X-BOUNDARY";

    fn state_for(tmp: &TempDir, upload_limit: u64) -> Arc<AppState> {
        let mut config = Config::load_from("/nonexistent/fileserver-config").unwrap();
        config.files.root = tmp.path().to_string_lossy().into_owned();
        config.files.upload_limit = upload_limit;
        Arc::new(AppState::new(config))
    }

    fn ctx(query: &str) -> RequestContext {
        RequestContext {
            path: "/".to_string(),
            query: parse_query(query),
            ..RequestContext::default()
        }
    }

    /// Request body delivered in frames with a pause before each one
    struct PacedBody {
        frames: VecDeque<Bytes>,
        pause: Pin<Box<Sleep>>,
    }

    impl PacedBody {
        fn new(data: &str, frame_len: usize) -> Self {
            let frames = data
                .as_bytes()
                .chunks(frame_len)
                .map(Bytes::copy_from_slice)
                .collect();
            Self {
                frames,
                pause: Box::pin(sleep(Duration::from_millis(5))),
            }
        }
    }

    impl Body for PacedBody {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
            ready!(self.pause.as_mut().poll(cx));
            let next = self.frames.pop_front();
            if next.is_some() {
                self.pause = Box::pin(sleep(Duration::from_millis(5)));
            }
            Poll::Ready(next.map(|data| Ok(Frame::data(data))))
        }
    }

    fn multipart_payload(file_name: &str, content: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
        )
    }

    fn multipart_body(file_name: &str, content: &str) -> (RequestContext, Full<Bytes>) {
        let body = multipart_payload(file_name, content);
        let mut ctx = ctx("path=inbox");
        ctx.content_type = Some(format!("multipart/form-data; boundary={BOUNDARY}"));
        ctx.content_length = Some(body.len() as u64);
        ctx.from_cookie = Some("/list?path=inbox&p=3".to_string());
        (ctx, Full::new(Bytes::from(body)))
    }

    #[tokio::test]
    async fn test_upload_saves_file_and_redirects() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("inbox")).unwrap();
        let state = state_for(&tmp, 1024);

        let (ctx, body) = multipart_body("report.txt", "quarterly numbers");
        let response = upload_file(&ctx, body, &state).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/list?path=inbox&p=3");
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("inbox/report.txt")).unwrap(),
            "quarterly numbers"
        );
        assert!(!tmp.path().join("inbox/report.txt.part").exists());
    }

    #[tokio::test]
    async fn test_upload_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("inbox")).unwrap();
        std::fs::write(tmp.path().join("inbox/a.txt"), "a much longer old body").unwrap();
        let state = state_for(&tmp, 1024);

        let (ctx, body) = multipart_body("a.txt", "new");
        upload_file(&ctx, body, &state).await;
        assert_eq!(std::fs::read_to_string(tmp.path().join("inbox/a.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_upload_over_limit() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("inbox")).unwrap();
        let state = state_for(&tmp, 16);

        let (ctx, body) = multipart_body("big.bin", &"x".repeat(100));
        let response = upload_file(&ctx, body, &state).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(!tmp.path().join("inbox/big.bin").exists());
    }

    #[tokio::test]
    async fn test_chunked_upload_over_limit_keeps_existing_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("inbox")).unwrap();
        std::fs::write(tmp.path().join("inbox/keep.txt"), "original contents").unwrap();
        let state = state_for(&tmp, 2000);

        let mut ctx = ctx("path=inbox");
        ctx.content_type = Some(format!("multipart/form-data; boundary={BOUNDARY}"));
        let body = PacedBody::new(&multipart_payload("keep.txt", &"x".repeat(5000)), 1000);

        let response = upload_file(&ctx, body, &state).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("inbox/keep.txt")).unwrap(),
            "original contents"
        );
        assert!(!tmp.path().join("inbox/keep.txt.part").exists());
    }

    #[tokio::test]
    async fn test_chunked_upload_within_limit() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("inbox")).unwrap();
        let state = state_for(&tmp, 10_000);

        let mut ctx = ctx("path=inbox");
        ctx.content_type = Some(format!("multipart/form-data; boundary={BOUNDARY}"));
        let body = PacedBody::new(&multipart_payload("log.txt", &"y".repeat(3000)), 700);

        let response = upload_file(&ctx, body, &state).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("inbox/log.txt")).unwrap(),
            "y".repeat(3000)
        );
    }

    #[tokio::test]
    async fn test_upload_without_multipart_fails() {
        let tmp = TempDir::new().unwrap();
        let state = state_for(&tmp, 1024);
        let response = upload_file(&ctx("path="), Full::new(Bytes::from("plain")), &state).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_delete_confirm_flow() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("docs")).unwrap();
        std::fs::write(tmp.path().join("docs/old.txt"), b"x").unwrap();
        let root = FileRoot::new(tmp.path());

        let confirm_page = delete_file(&ctx("path=docs%2Fold.txt"), &root).await;
        assert_eq!(confirm_page.status(), StatusCode::OK);
        assert!(tmp.path().join("docs/old.txt").exists());

        let response = delete_file(&ctx("path=docs%2Fold.txt&confirm=yes"), &root).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/list?path=docs&p=0");
        assert!(!tmp.path().join("docs/old.txt").exists());

        let again = delete_file(&ctx("path=docs%2Fold.txt&confirm=yes"), &root).await;
        assert_eq!(again.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_delete_without_path_redirects() {
        let tmp = TempDir::new().unwrap();
        let root = FileRoot::new(tmp.path());
        let response = delete_file(&ctx(""), &root).await;
        assert_eq!(response.headers()["location"], "/list");
    }

    #[tokio::test]
    async fn test_download_head_has_no_body() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.bin"), vec![1u8; 300]).unwrap();
        let root = FileRoot::new(tmp.path());

        let mut ctx = ctx("path=a.bin");
        ctx.is_head = true;
        let response = serve_download(&ctx, &root).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-length"], "300");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }
}
