//! Fetch-or-skip decision and byte transfer for resolved downloads.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use reqwest::Client;

use crate::error::{Error, FailureKind, Result};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::index::{Claim, ExistingFileIndex};
use crate::link::ResolvedDownload;
use crate::report::Outcome;

/// Trait for receiving download progress updates.
///
/// Implement this trait to receive callbacks during download operations.
/// All methods have default no-op implementations for convenience. Files
/// are identified by their destination path, which is unique within a run.
pub trait DownloadProgress: Send + Sync {
    /// Called before the files of a course are walked.
    fn on_course_start(&self, _course: &str) {}

    /// Called when the response for a file arrives. `size` is the
    /// advertised content length, if any.
    fn on_file_start(&self, _file: &Path, _size: Option<u64>) {}

    /// Called for every chunk written.
    fn on_progress(&self, _file: &Path, _bytes_delta: u64) {}

    /// Called when a file download completes successfully.
    fn on_file_complete(&self, _file: &Path, _bytes: u64) {}

    /// Called when a file is skipped because it already exists.
    fn on_skipped(&self, _file: &Path) {}

    /// Called when a file download fails.
    fn on_error(&self, _file: &Path, _error: &str) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Returns the `.part` file path for a given final path.
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Recovers the HTTP error behind an I/O error raised while streaming a
/// response body, so interrupted transfers are not mistaken for disk errors.
fn transfer_error(err: io::Error) -> Error {
    if !err
        .get_ref()
        .is_some_and(|inner| inner.is::<reqwest::Error>())
    {
        return Error::Io(err);
    }
    match err.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
        Some(Ok(http)) => Error::Http(*http),
        Some(Err(other)) => Error::Io(io::Error::other(other)),
        None => Error::Io(io::Error::other("transfer interrupted")),
    }
}

/// Writes resolved downloads to disk, skipping names the index already knows.
pub struct Dispatcher<F: FileSystem = TokioFileSystem> {
    http: Client,
    fs: Arc<F>,
}

impl Dispatcher<TokioFileSystem> {
    /// Creates a new dispatcher with the default file system.
    #[must_use]
    pub fn new(http: Client) -> Self {
        Self {
            http,
            fs: Arc::new(TokioFileSystem),
        }
    }
}

impl<F: FileSystem> Dispatcher<F> {
    /// Creates a new dispatcher with a custom file system implementation.
    #[must_use]
    pub const fn with_fs(http: Client, fs: Arc<F>) -> Self {
        Self { http, fs }
    }

    /// Returns the file system the dispatcher writes through.
    #[must_use]
    pub const fn fs(&self) -> &Arc<F> {
        &self.fs
    }

    /// Fetches `resolved` unless its name is already present.
    ///
    /// The destination directory is created first. A file already on disk,
    /// or already claimed by a concurrent dispatch, is skipped without any
    /// network access. The body is streamed to `<name>.part` and renamed on
    /// success; on any failure the partial file is removed and the name is
    /// released so no incomplete file is ever mistaken for a finished one.
    pub async fn dispatch(
        &self,
        resolved: &ResolvedDownload,
        index: &ExistingFileIndex<F>,
        progress: &Arc<dyn DownloadProgress>,
    ) -> Outcome {
        let name = resolved.final_file_name.as_str();
        let dir = resolved.destination_path.as_path();
        let target = resolved.target();

        if let Err(e) = self.fs.create_dir_all(dir).await {
            progress.on_error(&target, &e.to_string());
            return Outcome::Failed {
                kind: FailureKind::Filesystem,
                reason: format!("cannot create {}: {e}", dir.display()),
            };
        }

        let guard = match index.claim(dir, name).await {
            Ok(Claim::Acquired(guard)) => guard,
            Ok(Claim::Present) => {
                log::debug!("Skipping existing {}", target.display());
                progress.on_skipped(&target);
                return Outcome::Skipped;
            }
            Err(e) => {
                progress.on_error(&target, &e.to_string());
                return Outcome::Failed {
                    kind: FailureKind::Filesystem,
                    reason: e.to_string(),
                };
            }
        };

        match self.download(&target, resolved, progress).await {
            Ok(bytes) => {
                guard.commit();
                progress.on_file_complete(&target, bytes);
                Outcome::Downloaded { bytes }
            }
            Err(e) => {
                log::error!("Download failed: {name}: {e}");
                progress.on_error(&target, &e.to_string());
                Outcome::Failed {
                    kind: FailureKind::for_transfer(&e),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Downloads `resolved` with atomic `.part` file semantics.
    async fn download(
        &self,
        target: &Path,
        resolved: &ResolvedDownload,
        progress: &Arc<dyn DownloadProgress>,
    ) -> Result<u64> {
        let part = part_path(target);

        let result = match self.fetch_to(target, &resolved.final_url, &part, progress).await {
            Ok(bytes) => self
                .fs
                .rename(&part, target)
                .await
                .map(|()| bytes)
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        if result.is_err() && self.fs.exists(&part).await {
            if let Err(e) = self.fs.remove_file(&part).await {
                log::warn!("Could not remove {}: {e}", part.display());
            }
        }
        result
    }

    async fn fetch_to(
        &self,
        target: &Path,
        url: &str,
        part: &Path,
        progress: &Arc<dyn DownloadProgress>,
    ) -> Result<u64> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        progress.on_file_start(target, response.content_length());

        let body = response
            .bytes_stream()
            .map(|chunk| -> io::Result<bytes::Bytes> {
                let chunk = chunk.map_err(io::Error::other)?;
                progress.on_progress(target, chunk.len() as u64);
                Ok(chunk)
            })
            .boxed();

        self.fs.stream_write(part, body).await.map_err(transfer_error)
    }
}
