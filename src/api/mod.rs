//! Canvas LMS REST API access.
//!
//! [`CanvasApi`] is the seam the walker and coordinator depend on;
//! [`HttpCanvasClient`] implements it over `reqwest` with bearer-token
//! authentication and `Link` header pagination.

mod http;
pub mod types;

use async_trait::async_trait;

pub use http::HttpCanvasClient;
pub use types::{Course, File, Folder, Module, ModuleItem, ModuleItemKind, Submission};

use crate::error::Result;

/// Read-only view of the Canvas API used by the downloader.
#[async_trait]
pub trait CanvasApi: Send + Sync {
    /// Courses the user starred.
    async fn list_favorite_courses(&self) -> Result<Vec<Course>>;

    /// Every course the user is enrolled in.
    async fn list_all_courses(&self) -> Result<Vec<Course>>;

    async fn list_modules(&self, course_id: u64) -> Result<Vec<Module>>;

    async fn list_module_items(&self, course_id: u64, module_id: u64) -> Result<Vec<ModuleItem>>;

    /// Looks up a single file of a course, used for module `File` items.
    async fn get_file(&self, course_id: u64, file_id: u64) -> Result<File>;

    /// Every folder of a course, in no particular order.
    async fn list_folders(&self, course_id: u64) -> Result<Vec<Folder>>;

    async fn list_folder_files(&self, folder_id: u64) -> Result<Vec<File>>;

    /// The given user's submissions across the course's assignments.
    async fn list_submissions(&self, course_id: u64, user_id: &str) -> Result<Vec<Submission>>;
}
