//! Progress bars, per-file markers and the end-of-run summary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::{DownloadProgress, Failure, RunReport};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Formats a byte count with binary units, e.g. `1.50 MB`.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.2} {unit}")
}

/// Formats an elapsed time as `4.2s`, `3m 07s` or `1h 02m 03s`.
#[must_use]
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{s}.{}s", d.subsec_millis() / 100),
        (0, m, s) => format!("{m}m {s:02}s"),
        (h, m, s) => format!("{h}h {m:02}m {s:02}s"),
    }
}

fn make_progress_bar(size: Option<u64>, name: &str) -> ProgressBar {
    let bar = match size {
        Some(size) => {
            let bar = ProgressBar::new(size);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec} - {msg}",
                )
                .expect("progress template is valid")
                .progress_chars("━━╌"),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {bytes} @ {bytes_per_sec} - {msg}")
                    .expect("spinner template is valid"),
            );
            bar
        }
    };
    bar.set_message(name.to_string());
    bar
}

/// Renders download events as indicatif bars and coloured markers:
/// `+` downloaded, `*` already present, `!` failed.
pub struct CliProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<PathBuf, ProgressBar>>,
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl CliProgress {
    #[must_use]
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<PathBuf, ProgressBar>> {
        self.bars.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn line(&self, line: String) {
        let _ = self.multi.println(line);
    }

    /// Clears any bars left behind.
    pub fn finish(&self) {
        for (_, bar) in self.bars().drain() {
            bar.finish_and_clear();
        }
        self.multi.clear().ok();
    }
}

impl DownloadProgress for CliProgress {
    fn on_course_start(&self, course: &str) {
        self.line(format!("\n{}", style(course).bold().underlined()));
    }

    fn on_file_start(&self, file: &Path, size: Option<u64>) {
        let bar = self.multi.add(make_progress_bar(size, &display_name(file)));
        bar.enable_steady_tick(Duration::from_millis(250));
        if let Some(previous) = self.bars().insert(file.to_path_buf(), bar) {
            previous.finish_and_clear();
        }
    }

    fn on_progress(&self, file: &Path, bytes_delta: u64) {
        if let Some(bar) = self.bars().get(file) {
            bar.inc(bytes_delta);
        }
    }

    fn on_file_complete(&self, file: &Path, bytes: u64) {
        if let Some(bar) = self.bars().remove(file) {
            bar.finish_and_clear();
        }
        self.line(format!(
            "  {} {} ({})",
            style("+").green().bold(),
            display_name(file),
            format_bytes(bytes)
        ));
    }

    fn on_skipped(&self, file: &Path) {
        self.line(format!(
            "  {} {}",
            style("*").yellow(),
            style(display_name(file)).dim()
        ));
    }

    fn on_error(&self, file: &Path, error: &str) {
        if let Some(bar) = self.bars().remove(file) {
            bar.abandon();
        }
        self.line(format!(
            "  {} {}: {error}",
            style("!").red().bold(),
            display_name(file)
        ));
    }
}

/// The file name shown next to a marker or bar.
fn display_name(file: &Path) -> String {
    file.file_name()
        .unwrap_or(file.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// One summary line for a recorded failure.
fn format_failure(failure: &Failure) -> String {
    format!(
        "  [{}] {} / {} / {}: {}",
        failure.kind, failure.course, failure.container, failure.display_name, failure.reason
    )
}

/// Prints the end-of-run counts and every recorded failure.
pub fn print_summary(report: &RunReport) {
    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");
    println!("  Courses:           {}", report.courses);
    println!("  Files downloaded:  {}", report.downloaded);
    println!("  Files skipped:     {}", report.skipped);
    println!("  Files failed:      {}", report.failed);
    if report.downloaded > 0 {
        println!("  Total size:        {}", format_bytes(report.total_bytes));
        println!(
            "  Average speed:     {}/s",
            format_bytes(report.average_speed())
        );
    }
    println!("  Total time:        {}", format_elapsed(report.elapsed));

    if !report.failures.is_empty() {
        println!("{SEPARATOR}");
        println!("{}", style("Failures").red().bold());
        for failure in &report.failures {
            println!("{}", format_failure(failure));
        }
    }
    println!("{SEPARATOR}");
}
