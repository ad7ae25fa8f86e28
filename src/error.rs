//! Error types for the canvas-dl library.

use std::fmt;

use thiserror::Error;

/// Errors that can occur while talking to Canvas, resolving links or
/// writing files.
#[derive(Error, Debug)]
pub enum Error {
    /// The access token, domain or user id was rejected by Canvas.
    #[error("Canvas rejected the request: {0}")]
    Auth(String),

    /// The requested Canvas resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A request completed with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// URL of the failed request.
        url: String,
    },

    /// A shared document link could not be turned into a download.
    #[error("Link resolution failed: {0}")]
    Resolution(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body could not be decoded.
    #[error("Invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file or argument error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configuration file could not be parsed.
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A specialized `Result` type for canvas-dl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Category of a failure recorded in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Bad token, domain or user. Aborts the run.
    FatalAuth,
    /// Listing a module, folder or the submissions of a course failed.
    ContainerList,
    /// A shared document link could not be resolved.
    Resolution,
    /// Fetching the file bytes failed.
    Transport,
    /// Creating the directory or writing the file failed.
    Filesystem,
}

impl FailureKind {
    /// Classifies an error raised while transferring or writing a file.
    #[must_use]
    pub const fn for_transfer(error: &Error) -> Self {
        match error {
            Error::Io(_) => Self::Filesystem,
            Error::Resolution(_) => Self::Resolution,
            Error::Auth(_) => Self::FatalAuth,
            _ => Self::Transport,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FatalAuth => "FatalAuthError",
            Self::ContainerList => "ContainerListError",
            Self::Resolution => "ResolutionError",
            Self::Transport => "TransportError",
            Self::Filesystem => "FilesystemError",
        };
        f.write_str(name)
    }
}
