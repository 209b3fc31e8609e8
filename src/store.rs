//! Content-addressed upload persistence.
//!
//! Streams upload bytes to disk while hashing them in the same pass, then
//! renames the finished file to `<hash><ext>` inside the category directory.
//! The path is a pure function of the bytes and extension, so re-uploading
//! identical content converges on the same file and needs no locking.

use crate::error::StoreError;
use crate::validate::Category;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Counter for in-flight temp file names within this process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Result of persisting an upload
#[derive(Debug, Clone)]
pub struct StoreOutcome {
    /// Lowercase hex MD5 of the stored bytes
    pub hash: String,
    /// Stored filename: `<hash><ext>`
    pub filename: String,
    /// Total size in bytes
    pub size_bytes: u64,
    /// Whether a file with this content already existed
    pub already_existed: bool,
}

/// Upload persistence manager
pub struct ContentStore {
    image_dir: PathBuf,
    file_dir: PathBuf,
}

impl ContentStore {
    /// Create a content store with the given category directories,
    /// creating them if needed.
    pub async fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        image_dir: P,
        file_dir: Q,
    ) -> Result<Self, StoreError> {
        let image_dir = image_dir.as_ref().to_path_buf();
        let file_dir = file_dir.as_ref().to_path_buf();

        fs::create_dir_all(&image_dir).await?;
        fs::create_dir_all(&file_dir).await?;

        info!(
            image_dir = %image_dir.display(),
            file_dir = %file_dir.display(),
            "Initialized content store"
        );

        Ok(Self { image_dir, file_dir })
    }

    /// Destination directory for a category
    pub fn category_dir(&self, category: Category) -> &Path {
        match category {
            Category::Image => &self.image_dir,
            Category::File => &self.file_dir,
        }
    }

    /// Final path for a stored filename in a category
    pub fn stored_path(&self, category: Category, filename: &str) -> PathBuf {
        self.category_dir(category).join(filename)
    }

    /// Persist a byte stream under its content hash.
    ///
    /// The hash and the copy are derived from the same single read of the
    /// stream: each chunk feeds the hasher and the temp file before the next
    /// chunk is pulled. The destination name is only known once the stream
    /// ends, so bytes land in a temp file first and are renamed into place.
    /// Any failure (including the stream ending with an error on client
    /// disconnect) removes the temp file; a truncated file never becomes a
    /// stored object.
    ///
    /// `max_size` re-checks the category limit against actual streamed
    /// bytes, since the declared size checked earlier is client-supplied.
    pub async fn store_stream<S>(
        &self,
        category: Category,
        ext: &str,
        max_size: u64,
        stream: S,
    ) -> Result<StoreOutcome, StoreError>
    where
        S: Stream<Item = Result<Bytes, StoreError>> + Unpin,
    {
        let dir = self.category_dir(category);
        let tmp_path = dir.join(format!(
            ".upload-{}-{}",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let (hash, size_bytes) = match copy_and_hash(&tmp_path, max_size, stream).await {
            Ok(v) => v,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(e);
            }
        };

        let filename = format!("{}{}", hash, ext);
        let dest = dir.join(&filename);
        let already_existed = fs::metadata(&dest).await.is_ok();

        // Identical content renames onto identical bytes, so a concurrent
        // duplicate upload is a benign race.
        if let Err(e) = fs::rename(&tmp_path, &dest).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        info!(
            hash = %hash,
            size = size_bytes,
            existed = already_existed,
            path = %dest.display(),
            "Stored upload"
        );

        Ok(StoreOutcome {
            hash,
            filename,
            size_bytes,
            already_existed,
        })
    }
}

/// Single pass over the stream: hash and write each chunk, enforce the size
/// cap on actual bytes. Returns (hex hash, total bytes).
async fn copy_and_hash<S>(
    tmp_path: &Path,
    max_size: u64,
    mut stream: S,
) -> Result<(String, u64), StoreError>
where
    S: Stream<Item = Result<Bytes, StoreError>> + Unpin,
{
    let mut file = fs::File::create(tmp_path).await?;
    let mut hasher = Md5::new();
    let mut size_bytes: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as u64;
        if size_bytes > max_size {
            return Err(StoreError::TooLarge {
                size: size_bytes,
                limit: max_size,
            });
        }
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    drop(file);

    let hash = hex::encode(hasher.finalize());
    debug!(hash = %hash, size = size_bytes, "Hashed upload stream");

    Ok((hash, size_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tempfile::TempDir;

    fn bytes_stream(
        chunks: Vec<&'static [u8]>,
    ) -> impl Stream<Item = Result<Bytes, StoreError>> + Unpin {
        stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect::<Vec<_>>(),
        )
    }

    async fn store(dir: &TempDir) -> ContentStore {
        ContentStore::new(dir.path().join("image"), dir.path().join("file"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn store_is_single_pass_and_content_addressed() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        let outcome = store
            .store_stream(
                Category::Image,
                ".png",
                1024,
                bytes_stream(vec![&b"hello "[..], &b"world"[..]]),
            )
            .await
            .unwrap();

        // md5("hello world")
        assert_eq!(outcome.hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(outcome.filename, "5eb63bbbe01eeed093cb22bb8f5acdc3.png");
        assert_eq!(outcome.size_bytes, 11);
        assert!(!outcome.already_existed);

        let stored = std::fs::read(store.stored_path(Category::Image, &outcome.filename)).unwrap();
        assert_eq!(stored, b"hello world");
    }

    #[tokio::test]
    async fn identical_content_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        let first = store
            .store_stream(Category::File, ".bin", 1024, bytes_stream(vec![&b"same"[..]]))
            .await
            .unwrap();
        let second = store
            .store_stream(Category::File, ".bin", 1024, bytes_stream(vec![&b"same"[..]]))
            .await
            .unwrap();

        assert_eq!(first.hash, second.hash);
        assert_eq!(first.filename, second.filename);
        assert!(!first.already_existed);
        assert!(second.already_existed);

        let stored = std::fs::read(store.stored_path(Category::File, &second.filename)).unwrap();
        assert_eq!(stored, b"same");
    }

    #[tokio::test]
    async fn oversize_stream_is_rejected_and_cleaned_up() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        let err = store
            .store_stream(
                Category::File,
                ".bin",
                8,
                bytes_stream(vec![&b"0123"[..], &b"4567"[..], &b"89"[..]]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TooLarge { .. }));

        // No temp or final file survives the failure.
        let leftovers: Vec<_> = std::fs::read_dir(store.category_dir(Category::File))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn stream_error_discards_partial_write() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        let broken = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(StoreError::Parse("client disconnected".into())),
        ]);

        let err = store
            .store_stream(Category::Image, ".png", 1024, broken)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Parse(_)));

        let leftovers: Vec<_> = std::fs::read_dir(store.category_dir(Category::Image))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }
}
