//! Run-scoped index of file names already present in destination directories.
//!
//! Each directory is listed once, the first time it is queried, and the
//! names are cached for the rest of the run. Files written by the run are
//! recorded as they complete so a file reachable from two containers is
//! fetched only once, and Canvas file ids are claimed once per run so the
//! same file is not fetched again into a second directory.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;

use crate::error::Result;
use crate::fs::FileSystem;

#[derive(Default)]
struct Names {
    present: HashSet<String>,
    in_flight: HashSet<String>,
}

#[derive(Default)]
struct DirSlot {
    listed: OnceCell<()>,
    names: Mutex<Names>,
}

impl DirSlot {
    fn names(&self) -> MutexGuard<'_, Names> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of [`ExistingFileIndex::claim`].
pub enum Claim {
    /// The file already exists or another task is fetching it.
    Present,
    /// The caller now owns the right to write the file.
    Acquired(ClaimGuard),
}

/// Exclusive right to write one file name in one directory.
///
/// Call [`ClaimGuard::commit`] after the file is on disk. Dropping the
/// guard without committing releases the name so a later reference may
/// try again.
pub struct ClaimGuard {
    slot: Arc<DirSlot>,
    name: String,
    committed: bool,
}

impl ClaimGuard {
    /// Marks the claimed name as present for the rest of the run.
    pub fn commit(mut self) {
        let mut names = self.slot.names();
        names.in_flight.remove(&self.name);
        names.present.insert(std::mem::take(&mut self.name));
        drop(names);
        self.committed = true;
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if !self.committed {
            self.slot.names().in_flight.remove(&self.name);
        }
    }
}

/// Lazily populated lookup of existing file names per directory.
pub struct ExistingFileIndex<F: FileSystem> {
    fs: Arc<F>,
    dirs: Mutex<HashMap<PathBuf, Arc<DirSlot>>>,
    /// Canvas file ids handled so far, keyed by their decimal form.
    remote: Arc<DirSlot>,
}

impl<F: FileSystem> ExistingFileIndex<F> {
    /// Creates an empty index backed by the given file system.
    #[must_use]
    pub fn new(fs: Arc<F>) -> Self {
        Self {
            fs,
            dirs: Mutex::new(HashMap::new()),
            remote: Arc::default(),
        }
    }

    fn slot(&self, dir: &Path) -> Arc<DirSlot> {
        let mut dirs = self.dirs.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(dirs.entry(dir.to_path_buf()).or_default())
    }

    async fn loaded_slot(&self, dir: &Path) -> Result<Arc<DirSlot>> {
        let slot = self.slot(dir);
        slot.listed
            .get_or_try_init(|| async {
                let listed = self.fs.list_names(dir).await?;
                log::debug!("Indexed {} existing file(s) in {}", listed.len(), dir.display());
                slot.names().present.extend(listed);
                Ok::<_, crate::Error>(())
            })
            .await?;
        Ok(slot)
    }

    /// Returns whether `file_name` is present in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be listed.
    pub async fn has(&self, dir: &Path, file_name: &str) -> Result<bool> {
        let slot = self.loaded_slot(dir).await?;
        let present = slot.names().present.contains(file_name);
        Ok(present)
    }

    /// Marks `file_name` as present in `dir` without touching disk.
    pub fn record(&self, dir: &Path, file_name: &str) {
        self.slot(dir).names().present.insert(file_name.to_string());
    }

    /// Atomically checks for `file_name` and, if absent, reserves it for
    /// the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be listed.
    pub async fn claim(&self, dir: &Path, file_name: &str) -> Result<Claim> {
        let slot = self.loaded_slot(dir).await?;
        Ok(try_claim(slot, file_name))
    }

    /// Reserves a Canvas file id for the caller.
    ///
    /// The same file can be linked from a module and listed in a folder,
    /// landing in two different directories. Only the first reference to
    /// an id in a run gets [`Claim::Acquired`].
    #[must_use]
    pub fn claim_remote(&self, remote_id: u64) -> Claim {
        try_claim(Arc::clone(&self.remote), &remote_id.to_string())
    }
}

fn try_claim(slot: Arc<DirSlot>, name: &str) -> Claim {
    {
        let mut names = slot.names();
        if names.present.contains(name) || !names.in_flight.insert(name.to_string()) {
            return Claim::Present;
        }
    }
    Claim::Acquired(ClaimGuard {
        slot,
        name: name.to_string(),
        committed: false,
    })
}
