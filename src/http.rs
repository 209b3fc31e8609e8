//! HTTP API for uploads and retrieval
//!
//! Provides the upload and byte-serving endpoints:
//!
//! - `GET  /` - HTML upload form
//! - `POST /upload/image` - Upload an image (multipart field `file`)
//! - `POST /upload/file` - Upload a generic file (multipart field `file`)
//! - `GET  /image/{filename}` - Origin image bytes
//! - `GET  /thumbnail/{filename}` - Thumbnail bytes, origin fallback
//! - `GET  /file/{filename}` - Stored file bytes
//! - `GET  /download/{filename}` - Same bytes as attachment
//!
//! ## Example Usage
//!
//! ```bash
//! # Upload an image
//! curl -F "file=@photo.png" http://localhost:9000/upload/image
//!
//! # Fetch its thumbnail (falls back to the origin if absent)
//! curl http://localhost:9000/thumbnail/<hash>.png > thumb.png
//! ```

use crate::config::{Config, Mode};
use crate::error::StoreError;
use crate::retrieve::{Retriever, Served};
use crate::store::{ContentStore, StoreOutcome};
use crate::thumbnail::Thumbnailer;
use crate::validate::{Category, UploadPolicy};
use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Multipart field name carrying the upload bytes.
const FIELD: &str = "file";

/// Slack allowed between the request Content-Length and the category size
/// limit. The body length includes multipart boundary and part-header bytes
/// on top of the file itself, so comparing it against the file limit
/// directly would reject a file of exactly the limit. The store enforces
/// the exact limit on the streamed file bytes.
const MULTIPART_OVERHEAD: u64 = 1024;

/// HTTP server state
pub struct HttpServer {
    store: ContentStore,
    retriever: Retriever,
    policy: UploadPolicy,
    thumbnailer: Thumbnailer,
    thumbnail_dir: PathBuf,
    mode: Mode,
    bind_addr: SocketAddr,
}

impl HttpServer {
    /// Build the server from config, creating the storage directories.
    pub async fn from_config(config: &Config, bind_addr: SocketAddr) -> Result<Self, StoreError> {
        let store = ContentStore::new(config.image_dir(), config.file_dir()).await?;
        tokio::fs::create_dir_all(config.thumbnail_dir()).await?;

        Ok(Self {
            store,
            retriever: Retriever::new(
                config.image_dir(),
                config.thumbnail_dir(),
                config.file_dir(),
            ),
            policy: UploadPolicy::from_config(config),
            thumbnailer: Thumbnailer::new(
                config.image.thumbnail.max_width,
                config.image.thumbnail.max_height,
            ),
            thumbnail_dir: config.thumbnail_dir(),
            mode: config.mode,
            bind_addr,
        })
    }

    /// Run the HTTP server on the configured address
    pub async fn run(self: Arc<Self>) -> Result<(), StoreError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), StoreError> {
        info!(addr = %listener.local_addr()?, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Route requests to handlers
    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        debug!(method = %method, path = %path, "Incoming request");

        let result = match (method, path.as_str()) {
            (Method::GET, "/") => Ok(upload_form()),

            (Method::POST, "/upload/image") => self.handle_upload(req, Category::Image).await,
            (Method::POST, "/upload/file") => self.handle_upload(req, Category::File).await,

            (Method::GET, p) if p.starts_with("/image/") => {
                let filename = p.strip_prefix("/image/").unwrap_or("");
                self.retriever
                    .origin_image(filename)
                    .await
                    .map(|served| serve_bytes(served, None))
            }
            (Method::GET, p) if p.starts_with("/thumbnail/") => {
                let filename = p.strip_prefix("/thumbnail/").unwrap_or("");
                self.retriever
                    .thumbnail(filename)
                    .await
                    .map(|served| serve_bytes(served, None))
            }
            (Method::GET, p) if p.starts_with("/file/") => {
                let filename = p.strip_prefix("/file/").unwrap_or("");
                self.retriever
                    .file(filename)
                    .await
                    .map(|served| serve_bytes(served, None))
            }
            (Method::GET, p) if p.starts_with("/download/") => {
                let filename = p.strip_prefix("/download/").unwrap_or("");
                self.retriever
                    .file(filename)
                    .await
                    .map(|served| serve_bytes(served, Some(filename)))
            }

            _ => Err(StoreError::NotFound(path.clone())),
        };

        match result {
            Ok(response) => Ok(response),
            Err(e) => {
                let status = e.status();
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(path = %path, error = %e, "Request failed");
                } else {
                    debug!(path = %path, status = %status, error = %e, "Request rejected");
                }
                Ok(json_message(status, &e.public_message()))
            }
        }
    }

    /// POST /upload/{image,file} - Validate, persist, and (for images)
    /// attempt a thumbnail.
    async fn handle_upload(
        &self,
        req: Request<Incoming>,
        category: Category,
    ) -> Result<Response<Full<Bytes>>, StoreError> {
        let boundary = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|ct| multer::parse_boundary(ct).ok())
            .ok_or_else(|| StoreError::Parse("expected multipart/form-data".into()))?;

        // Content-Length minus the framing allowance is the declared file
        // size. Checking it here rejects oversize uploads before a single
        // body byte is read; the store re-checks the exact limit against
        // actual streamed bytes.
        let declared_size = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            .saturating_sub(MULTIPART_OVERHEAD);
        let limit = self.policy.max_size(category);
        if declared_size > limit {
            return Err(StoreError::TooLarge {
                size: declared_size,
                limit,
            });
        }

        let mut multipart = multer::Multipart::new(req.into_body().into_data_stream(), boundary);

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?
        {
            if field.name() != Some(FIELD) {
                continue;
            }

            let origin = field
                .file_name()
                .ok_or_else(|| StoreError::Parse("file field has no filename".into()))?
                .to_string();

            // Extension policy runs on the part headers, before any body
            // chunk is pulled or written.
            let ext = self.policy.check(category, &origin, declared_size)?;

            let chunks = Box::pin(field.map_err(|e| StoreError::Parse(e.to_string())));
            let outcome = self
                .store
                .store_stream(category, &ext, limit, chunks)
                .await?;

            if category == Category::Image {
                self.attempt_thumbnail(&outcome).await;
            }

            let body = serde_json::json!({
                "hash": outcome.hash,
                "filename": outcome.filename,
                "origin": origin,
                "size": outcome.size_bytes,
            });
            return Ok(json_response(StatusCode::OK, &body));
        }

        Err(StoreError::Parse(format!(
            "missing multipart field '{}'",
            FIELD
        )))
    }

    /// Best-effort thumbnail derivation. Never propagates: the stored
    /// upload succeeds whether or not a thumbnail exists.
    async fn attempt_thumbnail(&self, outcome: &StoreOutcome) {
        let origin_path = self.store.stored_path(Category::Image, &outcome.filename);
        let thumb_path = self.thumbnail_dir.join(&outcome.filename);

        match self.thumbnailer.derive(&origin_path, &thumb_path).await {
            Ok(()) => {
                debug!(filename = %outcome.filename, "Thumbnail derived");
            }
            Err(StoreError::UnsupportedFormat(ext)) => {
                debug!(filename = %outcome.filename, ext = %ext, "Thumbnail skipped, no codec");
            }
            Err(e) => match self.mode {
                Mode::Diagnostic => {
                    error!(filename = %outcome.filename, error = %e, "Thumbnail derivation failed")
                }
                Mode::Production => {
                    warn!(filename = %outcome.filename, error = %e, "Thumbnail derivation failed")
                }
            },
        }
    }
}

/// Build a byte-serving response. A download filename switches delivery to
/// attachment style; the bytes are identical either way.
fn serve_bytes(served: Served, download_as: Option<&str>) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, served.content_type)
        .header(header::CONTENT_LENGTH, served.bytes.len());

    if let Some(filename) = download_as {
        builder = builder.header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        );
    }

    builder.body(Full::new(Bytes::from(served.bytes))).unwrap()
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn json_message(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "message": message }))
}

fn upload_form() -> Response<Full<Bytes>> {
    let html = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>Upload</title>
</head>
<body>
<form action="/upload/image" method="post" enctype="multipart/form-data">
  <h2>Image Upload</h2>
  <input type="file" name="file">
  <input type="submit" value="Upload">
</form>

<hr>

<form action="/upload/file" method="post" enctype="multipart/form-data">
  <h2>File Upload</h2>
  <input type="file" name="file">
  <input type="submit" value="Upload">
</form>
</body>
</html>
"#;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Full::new(Bytes::from(html)))
        .unwrap()
}
