//! Configuration types for download runs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "CanvasFiles";

/// Which course containers to walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerMode {
    /// Files linked from modules, flattened into the course directory.
    Modules,
    /// The course file area, keeping its folder hierarchy.
    Folders,
    /// Only the user's own submission attachments.
    Submissions,
    /// Modules and folders.
    #[default]
    #[serde(alias = "all")]
    Both,
}

impl FromStr for ContainerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "modules" => Ok(Self::Modules),
            "folders" => Ok(Self::Folders),
            "submissions" => Ok(Self::Submissions),
            "both" | "all" => Ok(Self::Both),
            other => Err(Error::Config(format!(
                "unknown source '{other}' (expected modules, folders, submissions or both)"
            ))),
        }
    }
}

impl fmt::Display for ContainerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Modules => "modules",
            Self::Folders => "folders",
            Self::Submissions => "submissions",
            Self::Both => "both",
        })
    }
}

/// Configuration for download operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Number of files fetched concurrently.
    pub concurrent_files: usize,
    /// Upper bound for a single HTTP request, in seconds.
    pub request_timeout_secs: u64,
    /// Connection establishment timeout, in seconds.
    pub connect_timeout_secs: u64,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrent_files: 4,
            request_timeout_secs: 300,
            connect_timeout_secs: 30,
            user_agent: concat!("canvas-dl/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of concurrent file downloads. Zero is treated as one.
    #[must_use]
    pub fn with_concurrent_files(mut self, concurrent: usize) -> Self {
        self.concurrent_files = concurrent.max(1);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Builds the HTTP client shared by the Canvas API, the link resolver
    /// and the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn build_http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
    }
}

/// What a single run downloads and where it puts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Walk every enrolled course instead of favourites only.
    pub all: bool,
    /// Containers to walk within each course.
    pub from: ContainerMode,
    /// Root directory of the mirror.
    pub output_dir: PathBuf,
    /// Walk submissions in addition to `from`.
    pub include_submissions: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            all: false,
            from: ContainerMode::Both,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            include_submissions: true,
        }
    }
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    #[must_use]
    pub const fn with_from(mut self, from: ContainerMode) -> Self {
        self.from = from;
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub const fn with_submissions(mut self, include: bool) -> Self {
        self.include_submissions = include;
        self
    }
}

/// Complete application configuration, as read from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Download configuration.
    pub download: DownloadConfig,
    /// Defaults for each run; command-line flags override them.
    pub run: RunOptions,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Location of the per-user configuration file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("canvas-dl")
            .join("config.toml")
    }

    /// Parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Loads configuration from `path`, or from [`Self::default_path`] when
    /// it exists, or falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file is missing, or if any
    /// file that is read fails to parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let default = Self::default_path();
        if default.is_file() {
            log::info!("Loaded config from {}", default.display());
            return Self::from_file(&default);
        }
        Ok(Self::default())
    }
}
