//! Classification of file references and resolution of shared-document links.
//!
//! Most references point straight at Canvas-hosted bytes. Some are links to
//! Google Drive documents; those need one request to the Drive download
//! endpoint to learn the real download URL and file name.

use std::path::PathBuf;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::header::CONTENT_DISPOSITION;

use crate::error::{Error, Result};
use crate::sanitize::sanitize;
use crate::walker::FileReference;

static DRIVE_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://drive\.google\.com/file/d/([A-Za-z0-9_-]+)").expect("valid regex")
});

static DRIVE_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://drive\.google\.com/(?:open|uc)\?(?:[^#\s]*&)?id=([A-Za-z0-9_-]+)")
        .expect("valid regex")
});

static DOCS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://docs\.google\.com/(?:document|spreadsheets|presentation|drawings|file|uc)/d/([A-Za-z0-9_-]+)",
    )
    .expect("valid regex")
});

static FILENAME_UTF8_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)filename\*\s*=\s*UTF-8''([^";]+)"#).expect("valid regex"));

static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\s*=\s*(?:"([^"]*)"|([^";]+))"#).expect("valid regex")
});

/// MIME prefix Canvas reports for Google Workspace documents.
pub const GOOGLE_APPS_MIME_PREFIX: &str = "application/vnd.google-apps.";

const DRIVE_EXPORT_URL: &str = "https://docs.google.com/uc";

/// Extracts the shared file id from a Google Drive or Docs URL.
#[must_use]
pub fn shared_file_id(url: &str) -> Option<String> {
    [&*DRIVE_FILE_RE, &*DRIVE_OPEN_RE, &*DOCS_RE]
        .iter()
        .find_map(|re| re.captures(url).map(|c| c[1].to_string()))
}

/// Returns `true` if `url` points at a document-sharing service.
#[must_use]
pub fn is_shared_link(url: &str) -> bool {
    shared_file_id(url).is_some()
}

/// A reference whose bytes live on a document-sharing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedLink {
    /// Id of the shared file, if it could be read from the URL.
    pub external_id: Option<String>,
}

/// How a file reference must be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The content URL serves the file bytes.
    DirectFile,
    /// The content URL only points at the real document.
    IndirectLink(SharedLink),
}

/// Decides whether `reference` can be downloaded directly.
#[must_use]
pub fn classify(reference: &FileReference) -> Classification {
    if let Some(id) = shared_file_id(&reference.content_url) {
        return Classification::IndirectLink(SharedLink {
            external_id: Some(id),
        });
    }
    let sentinel = reference
        .mime_type
        .as_deref()
        .is_some_and(|m| m.starts_with(GOOGLE_APPS_MIME_PREFIX));
    if sentinel {
        return Classification::IndirectLink(SharedLink { external_id: None });
    }
    Classification::DirectFile
}

/// Download location and name of a shared file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    pub url: String,
    pub name: String,
}

/// A fully resolved download, ready for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDownload {
    pub final_url: String,
    /// Sanitized file name.
    pub final_file_name: String,
    pub destination_path: PathBuf,
}

impl ResolvedDownload {
    /// Full path of the downloaded file.
    #[must_use]
    pub fn target(&self) -> PathBuf {
        self.destination_path.join(&self.final_file_name)
    }
}

/// Turns a shared file id into a downloadable URL and name.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Issues one resolution request for `external_id`.
    async fn resolve_shared_file(&self, external_id: &str) -> Result<SharedFile>;
}

/// Resolves Google Drive file ids through the public download endpoint.
#[derive(Debug, Clone)]
pub struct DriveResolver {
    http: Client,
    export_url: String,
}

impl DriveResolver {
    #[must_use]
    pub fn new(http: Client) -> Self {
        Self::with_export_url(http, DRIVE_EXPORT_URL)
    }

    /// Uses a different download endpoint, e.g. a local test server.
    #[must_use]
    pub fn with_export_url(http: Client, export_url: impl Into<String>) -> Self {
        Self {
            http,
            export_url: export_url.into(),
        }
    }
}

#[async_trait]
impl LinkResolver for DriveResolver {
    async fn resolve_shared_file(&self, external_id: &str) -> Result<SharedFile> {
        let response = self
            .http
            .get(&self.export_url)
            .query(&[("export", "download"), ("id", external_id)])
            .send()
            .await
            .map_err(|e| Error::Resolution(format!("{external_id}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Resolution(format!(
                "{external_id}: HTTP {}",
                status.as_u16()
            )));
        }

        let name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(content_disposition_filename)
            .ok_or_else(|| {
                Error::Resolution(format!("{external_id}: response did not name a file"))
            })?;

        Ok(SharedFile {
            url: response.url().to_string(),
            name,
        })
    }
}

/// Reads the file name from a `Content-Disposition` header value.
///
/// The RFC 5987 `filename*=UTF-8''` form wins over plain `filename=`.
#[must_use]
pub fn content_disposition_filename(value: &str) -> Option<String> {
    if let Some(c) = FILENAME_UTF8_RE.captures(value)
        && let Ok(decoded) = urlencoding::decode(c[1].trim())
        && !decoded.is_empty()
    {
        return Some(decoded.into_owned());
    }
    let c = FILENAME_RE.captures(value)?;
    let raw = c.get(1).or_else(|| c.get(2))?.as_str().trim();
    let decoded = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |d| d.into_owned());
    (!decoded.is_empty()).then_some(decoded)
}

/// Classifies `reference` and produces the download the dispatcher will run.
///
/// Direct files pass through without network access. Indirect links cost
/// exactly one call to `resolver`, and the external file name replaces the
/// Canvas display name.
///
/// # Errors
///
/// Returns [`Error::Resolution`] if an indirect link has no usable id or the
/// resolver fails.
pub async fn resolve<R: LinkResolver + ?Sized>(
    reference: &FileReference,
    resolver: &R,
) -> Result<ResolvedDownload> {
    match classify(reference) {
        Classification::DirectFile => Ok(ResolvedDownload {
            final_url: reference.content_url.clone(),
            final_file_name: sanitize(&reference.display_name),
            destination_path: reference.destination.clone(),
        }),
        Classification::IndirectLink(link) => {
            let id = link.external_id.ok_or_else(|| {
                Error::Resolution(format!(
                    "{} is a shared document without a resolvable id",
                    reference.display_name
                ))
            })?;
            let shared = resolver.resolve_shared_file(&id).await.map_err(|e| match e {
                Error::Resolution(_) => e,
                other => Error::Resolution(other.to_string()),
            })?;
            log::debug!("Resolved shared link {id} to {}", shared.name);
            Ok(ResolvedDownload {
                final_url: shared.url,
                final_file_name: sanitize(&shared.name),
                destination_path: reference.destination.clone(),
            })
        }
    }
}
