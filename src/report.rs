//! Per-file outcomes and the aggregate report of a run.

use std::time::{Duration, Instant};

use crate::error::FailureKind;
use crate::walker::{ContainerFailure, FileReference};

/// Terminal state of one dispatched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The file was fetched and written.
    Downloaded {
        /// Bytes written to disk.
        bytes: u64,
    },
    /// A file with the same name already exists in the destination.
    Skipped,
    /// The file could not be fetched or written.
    Failed {
        kind: FailureKind,
        reason: String,
    },
}

/// One failure listed in the final summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// File display name, or the container label for listing failures.
    pub display_name: String,
    pub course: String,
    pub container: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Aggregate result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Total bytes downloaded.
    pub total_bytes: u64,
    /// Total elapsed time for the run.
    pub elapsed: Duration,
    /// Number of courses visited.
    pub courses: usize,
    pub failures: Vec<Failure>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    /// Creates an empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            downloaded: 0,
            skipped: 0,
            failed: 0,
            total_bytes: 0,
            elapsed: Duration::ZERO,
            courses: 0,
            failures: Vec::new(),
        }
    }

    /// Returns the average download speed in bytes per second.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn average_speed(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.total_bytes as f64 / secs) as u64
        } else {
            0
        }
    }

    /// Returns `true` if nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.failures.is_empty()
    }

    /// Number of files that reached a terminal state.
    #[must_use]
    pub const fn total_files(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }
}

/// Accumulates outcomes while a run is in progress.
pub struct RunReportBuilder {
    report: RunReport,
    start_time: Instant,
}

impl Default for RunReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReportBuilder {
    /// Creates a new builder; the run clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            report: RunReport::new(),
            start_time: Instant::now(),
        }
    }

    /// Counts a visited course.
    pub const fn add_course(&mut self) {
        self.report.courses += 1;
    }

    /// Records the outcome of one file.
    pub fn add_outcome(&mut self, reference: &FileReference, outcome: Outcome) {
        match outcome {
            Outcome::Downloaded { bytes } => {
                self.report.downloaded += 1;
                self.report.total_bytes += bytes;
            }
            Outcome::Skipped => self.report.skipped += 1,
            Outcome::Failed { kind, reason } => {
                self.report.failed += 1;
                self.report.failures.push(Failure {
                    display_name: reference.display_name.clone(),
                    course: reference.course_name.clone(),
                    container: reference.container.clone(),
                    kind,
                    reason,
                });
            }
        }
    }

    /// Records a container whose listing failed. Files inside it are
    /// unknown, so no file count changes.
    pub fn add_container_failure(&mut self, failure: ContainerFailure) {
        self.report.failures.push(Failure {
            display_name: failure.container.clone(),
            course: failure.course_name,
            container: failure.container,
            kind: FailureKind::ContainerList,
            reason: failure.error.to_string(),
        });
    }

    /// Builds the final report.
    #[must_use]
    pub fn build(mut self) -> RunReport {
        self.report.elapsed = self.start_time.elapsed();
        self.report
    }
}
