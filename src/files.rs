//! Static file serving for [`Router::static_files`](crate::Router::static_files).

use std::io;
use std::path::Path;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use tracing::{debug, error};

use crate::path;
use crate::response::Response;

/// Serves `rel` from below `root`.
///
/// `rel` is cleaned lexically against `/` first, so `..` segments can never
/// climb above `root`. A directory serves its `index.html`.
pub(crate) async fn serve(root: &Path, rel: &str) -> Response {
    let cleaned = path::clean(rel);
    let mut file = root.join(cleaned.trim_start_matches('/'));
    if !file.starts_with(root) {
        return Response::status(StatusCode::NOT_FOUND);
    }

    if tokio::fs::metadata(&file).await.is_ok_and(|m| m.is_dir()) {
        file.push("index.html");
    }

    match tokio::fs::read(&file).await {
        Ok(body) => Response {
            body: Bytes::from(body),
            headers: vec![(CONTENT_TYPE, HeaderValue::from_static(content_type(&file)))],
            status: StatusCode::OK,
        },
        Err(e) => error_response(&file, &e),
    }
}

fn error_response(file: &Path, e: &io::Error) -> Response {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
            debug!(file = %file.display(), "static file not found");
            Response::status(StatusCode::NOT_FOUND)
        }
        io::ErrorKind::PermissionDenied => Response::status(StatusCode::FORBIDDEN),
        _ => {
            error!(file = %file.display(), "reading static file failed: {e}");
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn content_type(file: &Path) -> &'static str {
    let ext = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn fixture(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("seed-files-{}-{name}", std::process::id()));
        std::fs::create_dir_all(dir.join("docs")).unwrap();
        std::fs::write(dir.join("app.css"), "body{}").unwrap();
        std::fs::write(dir.join("docs/index.html"), "<h1>docs</h1>").unwrap();
        dir
    }

    #[tokio::test]
    async fn serves_files_with_their_content_type() {
        let root = fixture("css");
        let res = serve(&root, "app.css").await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"body{}");
        assert_eq!(res.headers[0].1, "text/css; charset=utf-8");
    }

    #[tokio::test]
    async fn directories_serve_their_index() {
        let root = fixture("index");
        let res = serve(&root, "docs/").await;
        assert_eq!(res.body(), b"<h1>docs</h1>");
    }

    #[tokio::test]
    async fn dot_dot_cannot_escape_the_root() {
        let root = fixture("escape").join("docs");
        let res = serve(&root, "../app.css").await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_file_is_a_404() {
        let res = serve(&fixture("missing"), "nope.txt").await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }
}
