//! File system abstraction for testability.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// A fallible stream of body chunks handed to [`FileSystem::stream_write`].
pub type ByteStream<'a> = BoxStream<'a, io::Result<Bytes>>;

/// Abstraction over file system operations for testability.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Checks if a file exists at the given path.
    async fn exists(&self, path: &Path) -> bool;

    /// Lists the file names directly inside `dir`.
    ///
    /// A directory that does not exist yields an empty list.
    async fn list_names(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Creates all directories in the given path. Succeeds if they already exist.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Writes every chunk of `source` to a new file at `path`, returning the
    /// number of bytes written.
    async fn stream_write(&self, path: &Path, source: ByteStream<'_>) -> io::Result<u64>;

    /// Renames a file.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Removes a file.
    async fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// Default file system implementation using `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    /// Creates a new `TokioFileSystem` instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn list_names(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn stream_write(&self, path: &Path, source: ByteStream<'_>) -> io::Result<u64> {
        let mut file = tokio::fs::File::create(path).await?;
        let mut reader = StreamReader::new(source);
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}
