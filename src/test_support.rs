//! In-memory fakes shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{CanvasApi, Course, File, Folder, Module, ModuleItem, Submission};
use crate::error::{Error, Result};
use crate::link::{LinkResolver, SharedFile};
use crate::walker::FileReference;

/// Canvas API fake. Anything not registered answers `NotFound`.
#[derive(Default)]
pub struct MockCanvas {
    favorites: Vec<Course>,
    courses: Vec<Course>,
    auth_failure: Option<String>,
    modules: HashMap<u64, Vec<Module>>,
    module_items: HashMap<(u64, u64), Vec<ModuleItem>>,
    files: HashMap<(u64, u64), File>,
    folders: HashMap<u64, Vec<Folder>>,
    folder_files: HashMap<u64, Vec<File>>,
    failing_folders: HashSet<u64>,
    submissions: HashMap<u64, Vec<Submission>>,
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).expect("valid fixture json")
}

impl MockCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a starred course; it is listed by both course endpoints.
    pub fn with_favorite(mut self, course: Course) -> Self {
        self.favorites.push(course.clone());
        self.courses.push(course);
        self
    }

    /// Registers a course that is only visible with `--all`.
    pub fn with_course(mut self, course: Course) -> Self {
        self.courses.push(course);
        self
    }

    /// Makes every course listing answer with an authorization error.
    pub fn with_auth_failure(mut self, message: &str) -> Self {
        self.auth_failure = Some(message.to_string());
        self
    }

    pub fn with_modules(mut self, course_id: u64, modules: Value) -> Self {
        self.modules.insert(course_id, from_json(modules));
        self
    }

    pub fn with_module_items(mut self, course_id: u64, module_id: u64, items: Value) -> Self {
        self.module_items
            .insert((course_id, module_id), from_json(items));
        self
    }

    pub fn with_file(mut self, course_id: u64, file: File) -> Self {
        self.files.insert((course_id, file.id), file);
        self
    }

    pub fn with_folders(mut self, course_id: u64, folders: Vec<Folder>) -> Self {
        self.folders.insert(course_id, folders);
        self
    }

    pub fn with_folder_files(mut self, folder_id: u64, files: Vec<File>) -> Self {
        self.folder_files.insert(folder_id, files);
        self
    }

    /// Makes the file listing of `folder_id` fail with a server error.
    pub fn with_failing_folder(mut self, folder_id: u64) -> Self {
        self.failing_folders.insert(folder_id);
        self
    }

    pub fn with_submissions(mut self, course_id: u64, submissions: Value) -> Self {
        self.submissions.insert(course_id, from_json(submissions));
        self
    }

    fn check_auth(&self) -> Result<()> {
        match &self.auth_failure {
            Some(message) => Err(Error::Auth(message.clone())),
            None => Ok(()),
        }
    }
}

fn missing<T>(what: String) -> Result<T> {
    Err(Error::NotFound(what))
}

#[async_trait]
impl CanvasApi for MockCanvas {
    async fn list_favorite_courses(&self) -> Result<Vec<Course>> {
        self.check_auth()?;
        Ok(self.favorites.clone())
    }

    async fn list_all_courses(&self) -> Result<Vec<Course>> {
        self.check_auth()?;
        Ok(self.courses.clone())
    }

    async fn list_modules(&self, course_id: u64) -> Result<Vec<Module>> {
        self.modules
            .get(&course_id)
            .cloned()
            .map_or_else(|| missing(format!("modules of {course_id}")), Ok)
    }

    async fn list_module_items(&self, course_id: u64, module_id: u64) -> Result<Vec<ModuleItem>> {
        self.module_items
            .get(&(course_id, module_id))
            .cloned()
            .map_or_else(|| missing(format!("items of module {module_id}")), Ok)
    }

    async fn get_file(&self, course_id: u64, file_id: u64) -> Result<File> {
        self.files
            .get(&(course_id, file_id))
            .cloned()
            .map_or_else(|| missing(format!("file {file_id}")), Ok)
    }

    async fn list_folders(&self, course_id: u64) -> Result<Vec<Folder>> {
        self.folders
            .get(&course_id)
            .cloned()
            .map_or_else(|| missing(format!("folders of {course_id}")), Ok)
    }

    async fn list_folder_files(&self, folder_id: u64) -> Result<Vec<File>> {
        if self.failing_folders.contains(&folder_id) {
            return Err(Error::Status {
                status: 500,
                url: format!("folders/{folder_id}/files"),
            });
        }
        self.folder_files
            .get(&folder_id)
            .cloned()
            .map_or_else(|| missing(format!("files of folder {folder_id}")), Ok)
    }

    async fn list_submissions(&self, course_id: u64, _user_id: &str) -> Result<Vec<Submission>> {
        self.submissions
            .get(&course_id)
            .cloned()
            .map_or_else(|| missing(format!("submissions of {course_id}")), Ok)
    }
}

/// Resolver whose every lookup fails.
pub struct FailingResolver;

#[async_trait]
impl LinkResolver for FailingResolver {
    async fn resolve_shared_file(&self, external_id: &str) -> Result<SharedFile> {
        Err(Error::Resolution(format!("{external_id} is not shared")))
    }
}

pub fn course(id: u64, name: &str) -> Course {
    Course {
        id,
        name: name.to_string(),
        course_code: format!("C{id}"),
        access_restricted_by_date: false,
    }
}

pub fn folder(id: u64, name: &str, parent: Option<u64>, files_count: u64) -> Folder {
    Folder {
        id,
        name: name.to_string(),
        parent_folder_id: parent,
        files_count,
    }
}

pub fn listed_file(id: u64, name: &str, url: &str) -> File {
    File {
        id,
        display_name: name.to_string(),
        filename: name.to_string(),
        url: Some(url.to_string()),
        content_type: None,
    }
}

pub fn file_ref(name: &str, url: &str) -> FileReference {
    FileReference {
        remote_id: Some(1),
        display_name: name.to_string(),
        mime_type: None,
        content_url: url.to_string(),
        destination: PathBuf::from("CanvasFiles/Course"),
        course_name: "Course".to_string(),
        container: "folder '/'".to_string(),
    }
}
