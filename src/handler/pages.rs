//! HTML pages: directory listing, viewers and the delete confirmation
//!
//! Pages are rendered in place; every path placed in a link is
//! percent-encoded and every path shown as text is HTML-escaped.

use crate::config::AppState;
use crate::fs::{self, FileMetadata, FileRoot};
use crate::handler::router::RequestContext;
use crate::http::mime::FileKind;
use crate::http::{self, HttpResponse};
use crate::transfer::{open_chunk_stream, CancellationSignal};
use html_escape::{encode_double_quoted_attribute, encode_text};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::fmt::Write;
use std::sync::Arc;

/// URL of listing page `page` of `dir`
pub fn list_url(dir: &str, page: usize) -> String {
    format!("/list?path={}&p={page}", encode(dir))
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

fn page_shell(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<link rel=\"stylesheet\" href=\"/css/style.css\">\n</head>\n\
         <body>\n{body}</body>\n</html>\n",
        encode_text(title)
    )
}

/// Link back to the listing that contains `path`
fn back_link(path: &str) -> String {
    format!(
        "<p><a href=\"{}\">Back</a></p>\n",
        list_url(fs::parent_path(path), 0)
    )
}

/// Viewer URL for a listed entry
fn entry_href(file: &FileMetadata) -> String {
    let path = encode(&file.path);
    if file.is_dir {
        return format!("/list?path={path}&p=0");
    }
    match file.kind() {
        FileKind::Image => format!("/img?path={path}"),
        FileKind::Video => format!("/video?path={path}"),
        FileKind::Text => format!("/txt?path={path}"),
        FileKind::Other => format!("/download?path={path}"),
    }
}

/// Render one page of a directory listing
pub fn render_list(dir: &str, page: usize, files: &[FileMetadata], page_size: usize) -> String {
    let title = if dir.is_empty() { "/" } else { dir };
    let mut body = format!("<h1>{}</h1>\n", encode_text(title));

    if !dir.is_empty() {
        let _ = writeln!(
            body,
            "<p><a href=\"{}\">Parent directory</a></p>",
            list_url(fs::parent_path(dir), 0)
        );
    }

    body.push_str("<table>\n");
    for file in files {
        let name = encode_text(file.basename());
        let size = if file.is_dir {
            "-".to_string()
        } else {
            file.size.to_string()
        };
        let _ = writeln!(
            body,
            "<tr><td><a href=\"{}\">{name}{}</a></td><td>{size}</td>\
             <td><a href=\"/del?path={}\">Delete</a></td></tr>",
            entry_href(file),
            if file.is_dir { "/" } else { "" },
            encode(&file.path),
        );
    }
    body.push_str("</table>\n<p>");

    if page > 0 {
        let _ = write!(body, "<a href=\"{}\">Prev</a> ", list_url(dir, page - 1));
    }
    let _ = write!(body, "Page {}", page + 1);
    if files.len() == page_size {
        let _ = write!(body, " <a href=\"{}\">Next</a>", list_url(dir, page + 1));
    }
    body.push_str("</p>\n");

    let _ = writeln!(
        body,
        "<form action=\"/upload?path={}\" method=\"post\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"file\"> <input type=\"submit\" value=\"Upload\"></form>",
        encode(dir)
    );

    page_shell(title, &body)
}

pub fn render_image(path: &str) -> String {
    let body = format!(
        "<h1>{}</h1>\n{}<img src=\"/download?path={}\" alt=\"{}\">\n",
        encode_text(path),
        back_link(path),
        encode(path),
        encode_double_quoted_attribute(path),
    );
    page_shell(path, &body)
}

pub fn render_video(path: &str) -> String {
    let body = format!(
        "<h1>{}</h1>\n{}<video controls preload=\"metadata\" src=\"/download?path={}\"></video>\n",
        encode_text(path),
        back_link(path),
        encode(path),
    );
    page_shell(path, &body)
}

pub fn render_text(path: &str, content: &str) -> String {
    let body = format!(
        "<h1>{}</h1>\n{}<pre>{}</pre>\n",
        encode_text(path),
        back_link(path),
        encode_text(content),
    );
    page_shell(path, &body)
}

pub fn render_delete(path: &str) -> String {
    let body = format!(
        "<h1>Delete {}?</h1>\n<p><a href=\"/del?path={}&confirm=yes\">Yes, delete it</a> \
         <a href=\"{}\">Cancel</a></p>\n",
        encode_text(path),
        encode(path),
        list_url(fs::parent_path(path), 0),
    );
    page_shell(path, &body)
}

/// `/list?path=&p=`
pub async fn serve_list(ctx: &RequestContext, state: &Arc<AppState>) -> HttpResponse {
    let dir = ctx.param("path").unwrap_or("");
    let page = ctx.param("p").and_then(|p| p.parse().ok()).unwrap_or(0);
    let page_size = state.config.files.page_size.max(1);

    match state.root.list(dir, page, page_size).await {
        Ok(files) => {
            let html = render_list(dir, page, &files, page_size);
            let cookie = format!("from={}; Path=/", list_url(dir, page));
            http::build_html_response(html, Some(&cookie), ctx.is_head)
        }
        Err(e) => {
            crate::logger::log_error(&format!("Listing '{dir}' failed: {e}"));
            http::build_503_response(&e.to_string())
        }
    }
}

/// `/img?path=`
pub fn serve_image(ctx: &RequestContext) -> HttpResponse {
    match ctx.param("path") {
        Some(path) => http::build_html_response(render_image(path), None, ctx.is_head),
        None => http::build_redirect_response("/list"),
    }
}

/// `/video?path=`
pub fn serve_video(ctx: &RequestContext) -> HttpResponse {
    match ctx.param("path") {
        Some(path) => http::build_html_response(render_video(path), None, ctx.is_head),
        None => http::build_redirect_response("/list"),
    }
}

/// `/txt?path=[&encode=gbk]`: the whole file, read through the chunk streamer
///
/// Text is decoded as UTF-8 unless `encode=gbk` asks for GBK. Invalid
/// sequences are replaced rather than rejected.
pub async fn serve_text(ctx: &RequestContext, root: &FileRoot) -> HttpResponse {
    let Some(path) = ctx.param("path") else {
        return http::build_redirect_response("/list");
    };

    let mut stream = match open_chunk_stream(root, path, 0, 0, CancellationSignal::new()).await {
        Ok(stream) => stream,
        Err(e) => {
            crate::logger::log_error(&format!("Reading '{path}' failed: {e}"));
            return http::build_503_response(&e.to_string());
        }
    };

    let mut content = Vec::new();
    while let Some(chunk) = stream.next_chunk().await {
        match chunk {
            Ok(bytes) => content.extend_from_slice(&bytes),
            Err(e) => return http::build_503_response(&e.to_string()),
        }
    }

    let text = if ctx.param("encode") == Some("gbk") {
        encoding_rs::GBK.decode(&content).0
    } else {
        String::from_utf8_lossy(&content)
    };
    http::build_html_response(render_text(path, &text), None, ctx.is_head)
}
