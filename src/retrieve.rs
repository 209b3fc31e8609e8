//! Read-side resolution of stored filenames to bytes.
//!
//! Every call re-checks the filesystem; nothing caches existence, since new
//! uploads can land between requests. A miss is `StoreError::NotFound`,
//! which the HTTP layer turns into a 404.

use crate::error::StoreError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Bytes ready to serve, with a content type guessed from the extension.
#[derive(Debug)]
pub struct Served {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Read-only resolver over the storage layout.
pub struct Retriever {
    image_dir: PathBuf,
    thumbnail_dir: PathBuf,
    file_dir: PathBuf,
}

impl Retriever {
    pub fn new<P: AsRef<Path>>(image_dir: P, thumbnail_dir: P, file_dir: P) -> Self {
        Self {
            image_dir: image_dir.as_ref().to_path_buf(),
            thumbnail_dir: thumbnail_dir.as_ref().to_path_buf(),
            file_dir: file_dir.as_ref().to_path_buf(),
        }
    }

    /// Serve an origin image by stored filename.
    pub async fn origin_image(&self, filename: &str) -> Result<Served, StoreError> {
        sanitize(filename)?;
        read_or_not_found(&self.image_dir.join(filename), filename).await
    }

    /// Serve a thumbnail, falling back to the origin image.
    ///
    /// Thumbnails are best-effort and may legitimately be missing (codec
    /// without thumbnail support, derivation failure), so absence falls
    /// through to the origin before becoming a 404.
    pub async fn thumbnail(&self, filename: &str) -> Result<Served, StoreError> {
        sanitize(filename)?;
        match read_or_not_found(&self.thumbnail_dir.join(filename), filename).await {
            Ok(served) => Ok(served),
            Err(StoreError::NotFound(_)) => {
                debug!(filename = %filename, "Thumbnail absent, falling back to origin");
                read_or_not_found(&self.image_dir.join(filename), filename).await
            }
            Err(e) => Err(e),
        }
    }

    /// Serve a stored generic file by filename. The inline/attachment
    /// distinction is a response-header concern left to the HTTP layer.
    pub async fn file(&self, filename: &str) -> Result<Served, StoreError> {
        sanitize(filename)?;
        read_or_not_found(&self.file_dir.join(filename), filename).await
    }
}

/// Reject names that could escape the storage directories. Bad names get
/// the same 404 a miss would, revealing nothing.
fn sanitize(filename: &str) -> Result<(), StoreError> {
    if filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(StoreError::NotFound(filename.to_string()));
    }
    Ok(())
}

async fn read_or_not_found(path: &Path, filename: &str) -> Result<Served, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Served {
            bytes,
            content_type: mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StoreError::NotFound(filename.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn retriever(dir: &TempDir) -> Retriever {
        for sub in ["image", "thumbnail", "file"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        Retriever::new(
            dir.path().join("image"),
            dir.path().join("thumbnail"),
            dir.path().join("file"),
        )
    }

    #[tokio::test]
    async fn serves_origin_with_guessed_mime() {
        let dir = TempDir::new().unwrap();
        let r = retriever(&dir);
        std::fs::write(dir.path().join("image/abc.png"), b"png bytes").unwrap();

        let served = r.origin_image("abc.png").await.unwrap();
        assert_eq!(served.bytes, b"png bytes");
        assert_eq!(served.content_type, "image/png");
    }

    #[tokio::test]
    async fn thumbnail_prefers_thumbnail_then_origin() {
        let dir = TempDir::new().unwrap();
        let r = retriever(&dir);
        std::fs::write(dir.path().join("image/a.png"), b"origin").unwrap();
        std::fs::write(dir.path().join("thumbnail/a.png"), b"small").unwrap();

        assert_eq!(r.thumbnail("a.png").await.unwrap().bytes, b"small");

        std::fs::remove_file(dir.path().join("thumbnail/a.png")).unwrap();
        assert_eq!(r.thumbnail("a.png").await.unwrap().bytes, b"origin");
    }

    #[tokio::test]
    async fn miss_is_not_found_everywhere() {
        let dir = TempDir::new().unwrap();
        let r = retriever(&dir);

        for result in [
            r.origin_image("ghost.png").await,
            r.thumbnail("ghost.png").await,
            r.file("ghost.bin").await,
        ] {
            assert!(matches!(result, Err(StoreError::NotFound(_))));
        }
    }

    #[tokio::test]
    async fn path_traversal_is_a_404() {
        let dir = TempDir::new().unwrap();
        let r = retriever(&dir);
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        let result = r.file("../secret.txt").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn unknown_extension_served_as_octet_stream() {
        let dir = TempDir::new().unwrap();
        let r = retriever(&dir);
        std::fs::write(dir.path().join("file/blob.xyz123"), b"data").unwrap();

        let served = r.file("blob.xyz123").await.unwrap();
        assert_eq!(served.content_type, "application/octet-stream");
    }
}
