//! canvas-dl - A library for mirroring Canvas LMS course files to disk.
//!
//! The library walks the modules, folders and submissions of each course,
//! resolves shared Google Drive links, and downloads every file that is not
//! already present locally. It is independent of any UI; progress is
//! reported through the [`DownloadProgress`] trait.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use canvas_dl::{DownloadConfig, NoProgress, RunOptions};
//!
//! # async fn example() -> canvas_dl::Result<()> {
//! let options = RunOptions::new().with_output_dir("CanvasFiles");
//! let report = canvas_dl::run(
//!     "access-token",
//!     "school.instructure.com",
//!     "12345",
//!     &options,
//!     &DownloadConfig::default(),
//!     Arc::new(NoProgress),
//! )
//! .await?;
//! println!("Downloaded {} files", report.downloaded);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fs;
pub mod index;
pub mod link;
pub mod report;
pub mod run;
pub mod sanitize;
pub mod walker;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use api::{CanvasApi, HttpCanvasClient};
pub use config::{AppConfig, ContainerMode, DownloadConfig, RunOptions};
pub use dispatch::{Dispatcher, DownloadProgress, NoProgress};
pub use error::{Error, FailureKind, Result};
pub use fs::{FileSystem, TokioFileSystem};
pub use index::ExistingFileIndex;
pub use link::{Classification, DriveResolver, LinkResolver, ResolvedDownload, classify, resolve};
pub use report::{Failure, Outcome, RunReport};
pub use run::{Coordinator, run};
pub use sanitize::sanitize;
pub use walker::{FileReference, WalkEvent, WalkPlan, walk};
