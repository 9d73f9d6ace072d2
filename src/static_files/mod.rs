//! Static file serving.
//!
//! # Responsibilities
//! - Map the path remainder after a static prefix onto a root directory
//! - Refuse anything that would leave the root (403)
//! - Stream file bytes with Content-Type and Content-Length
//!
//! # Design Decisions
//! - The root is canonicalized once at startup; every request path is
//!   canonicalized and compared against it
//! - Directories are 404 unless an index file is configured and present;
//!   there are no generated listings
//! - Files are streamed from the open handle, never read whole into memory
//! - Only GET and HEAD are answered

pub mod path;

use std::io;
use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, StatusCode},
    response::Response,
};
use tokio_util::io::ReaderStream;

use crate::error::ProxyError;

/// A directory served under one static prefix.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    index: Option<String>,
}

impl StaticFiles {
    /// Open a root directory. Fails if it does not exist or is not a directory.
    pub fn new(root: impl AsRef<Path>, index: Option<String>) -> io::Result<Self> {
        let root = std::fs::canonicalize(root.as_ref()).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("static root {}: {}", root.as_ref().display(), e),
            )
        })?;

        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("static root is not a directory: {}", root.display()),
            ));
        }

        Ok(Self { root, index })
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path remainder to a file path inside the root.
    pub async fn resolve(&self, remainder: &str) -> Result<PathBuf, ProxyError> {
        let relative = path::normalize(remainder)?;
        let resolved = path::confine(&self.root, &relative).await?;

        let metadata = tokio::fs::metadata(&resolved)
            .await
            .map_err(|e| path::lookup_error(&resolved, e))?;
        if !metadata.is_dir() {
            return Ok(resolved);
        }

        match &self.index {
            Some(index) => path::confine(&self.root, &relative.join(index)).await,
            None => Err(ProxyError::NotFound {
                path: resolved.display().to_string(),
            }),
        }
    }

    /// Answer a request for `remainder`.
    pub async fn serve(&self, method: &Method, remainder: &str) -> Result<Response, ProxyError> {
        if method != Method::GET && method != Method::HEAD {
            return Err(ProxyError::MethodNotAllowed {
                method: method.clone(),
            });
        }

        let resolved = self.resolve(remainder).await?;
        let file = tokio::fs::File::open(&resolved)
            .await
            .map_err(|e| path::lookup_error(&resolved, e))?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(ProxyError::NotFound {
                path: resolved.display().to_string(),
            });
        }

        let body = if method == Method::HEAD {
            Body::empty()
        } else {
            Body::from_stream(ReaderStream::new(file))
        };

        let mut response = Response::new(body);
        *response.status_mut() = StatusCode::OK;

        let mime = mime_guess::from_path(&resolved).first_or_octet_stream();
        if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));

        tracing::trace!(
            file = %resolved.display(),
            bytes = metadata.len(),
            "Serving static file"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::fs;
    use tempfile::TempDir;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 1, 2, 3];

    fn site() -> (TempDir, StaticFiles) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("logo.png"), PNG).unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs").join("index.html"), "<h1>docs</h1>").unwrap();
        let files = StaticFiles::new(dir.path(), None).unwrap();
        (dir, files)
    }

    async fn body_of(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[test]
    fn root_must_be_a_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file"), "x").unwrap();

        assert!(StaticFiles::new(dir.path().join("file"), None).is_err());
        assert!(StaticFiles::new(dir.path().join("missing"), None).is_err());
    }

    #[tokio::test]
    async fn serves_file_with_type_and_length() {
        let (_dir, files) = site();

        let response = files.serve(&Method::GET, "/logo.png").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            response.headers()[header::CONTENT_LENGTH],
            PNG.len().to_string().as_str()
        );
        assert_eq!(body_of(response).await, PNG);
    }

    #[tokio::test]
    async fn head_has_length_but_no_body() {
        let (_dir, files) = site();

        let response = files.serve(&Method::HEAD, "/logo.png").await.unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_LENGTH],
            PNG.len().to_string().as_str()
        );
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn rejects_other_methods() {
        let (_dir, files) = site();

        let err = files.serve(&Method::POST, "/logo.png").await.unwrap_err();
        assert!(matches!(err, ProxyError::MethodNotAllowed { .. }));
    }

    #[tokio::test]
    async fn traversal_is_forbidden() {
        let (_dir, files) = site();

        for path in ["/../../etc/passwd", "/docs/../../x", "/%2e%2e/%2e%2e/etc/passwd"] {
            let err = files.serve(&Method::GET, path).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::FORBIDDEN, "{}", path);
        }
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let (_dir, files) = site();

        let err = files.serve(&Method::GET, "/nope.css").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let err = files.serve(&Method::GET, "/logo.png/inner").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn directories_are_not_found_without_index() {
        let (_dir, files) = site();

        for path in ["", "/", "/docs", "/docs/"] {
            let err = files.serve(&Method::GET, path).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::NOT_FOUND, "{:?}", path);
        }
    }

    #[tokio::test]
    async fn directories_serve_configured_index() {
        let (dir, _) = site();
        let files = StaticFiles::new(dir.path(), Some("index.html".into())).unwrap();

        let response = files.serve(&Method::GET, "/docs/").await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert_eq!(body_of(response).await, b"<h1>docs</h1>");

        // The root has no index.html.
        let err = files.serve(&Method::GET, "").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn repeated_reads_are_identical() {
        let (_dir, files) = site();

        let first = files.serve(&Method::GET, "/logo.png").await.unwrap();
        let second = files.serve(&Method::GET, "/logo.png").await.unwrap();
        assert_eq!(first.status(), second.status());
        assert_eq!(first.headers(), second.headers());
        assert_eq!(body_of(first).await, body_of(second).await);
    }
}
