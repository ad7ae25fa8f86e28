//! Canvas REST records, trimmed to the fields the downloader reads.

use serde::Deserialize;

/// A course the user is enrolled in.
#[derive(Debug, Clone, Deserialize)]
pub struct Course {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub access_restricted_by_date: bool,
}

impl Course {
    /// Name used for the course directory. Falls back to the course code
    /// for courses Canvas returns without a name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.course_code
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Module {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub items_count: Option<u64>,
}

/// Kind of a module item. Only `File` and `ExternalUrl` can carry files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum ModuleItemKind {
    File,
    ExternalUrl,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleItem {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ModuleItemKind,
    #[serde(default)]
    pub content_id: Option<u64>,
    #[serde(default)]
    pub external_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Folder {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_folder_id: Option<u64>,
    #[serde(default)]
    pub files_count: u64,
}

/// A file record, as returned by folder listings, file lookups and
/// submission attachments.
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub id: u64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub filename: String,
    /// Download URL. `None` for locked files.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "content-type")]
    pub content_type: Option<String>,
}

impl File {
    /// Best available human name for the file.
    #[must_use]
    pub fn name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.filename
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub id: u64,
    #[serde(default)]
    pub workflow_state: String,
    #[serde(default)]
    pub attachments: Option<Vec<File>>,
}

impl Submission {
    /// Whether the user has actually turned something in.
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.workflow_state != "unsubmitted"
    }
}

/// Error body Canvas returns alongside 4xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorMessage {
    #[serde(default)]
    pub message: String,
}
