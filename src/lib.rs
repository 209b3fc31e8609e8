//! Depot - content-addressed file and image upload daemon
//!
//! Accepts multipart uploads over HTTP, persists bytes under their content
//! hash, derives bounded thumbnails for supported image formats, and serves
//! stored bytes back by name.
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/depot/
//! ├── image/            # Origin images, named <md5><ext>
//! ├── thumbnail/        # Best-effort thumbnails, same filenames
//! ├── file/             # Generic files, named <md5><ext>
//! └── config.toml       # Configuration
//! ```
//!
//! ## Pipeline
//!
//! An upload passes validation (extension + declared size, before any disk
//! write), then a single-pass hash-while-copy into the category directory,
//! then for images a best-effort thumbnail derivation whose failure never
//! fails the upload. Retrieval re-checks the filesystem per request and
//! falls back from thumbnail to origin.

pub mod config;
pub mod error;
pub mod http;
pub mod retrieve;
pub mod store;
pub mod thumbnail;
pub mod validate;

// Re-exports
pub use config::{Config, Mode};
pub use error::StoreError;
pub use http::HttpServer;
pub use retrieve::{Retriever, Served};
pub use store::{ContentStore, StoreOutcome};
pub use thumbnail::Thumbnailer;
pub use validate::{Category, UploadPolicy};
