//! Enumeration of the files reachable from a course.
//!
//! [`walk`] drives an explicit work queue and yields [`WalkEvent`]s lazily,
//! one API call at a time. Module files are flattened into the course
//! directory, folder files keep the folder hierarchy and submission
//! attachments land in `Submissions/`.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use futures::Stream;
use futures::stream;

use crate::api::{CanvasApi, Course, File, Folder, Module, ModuleItem, ModuleItemKind};
use crate::config::ContainerMode;
use crate::error::Error;
use crate::link::is_shared_link;
use crate::sanitize::sanitize;

/// Directory submission attachments are saved under.
pub const SUBMISSIONS_DIR: &str = "Submissions";

/// A file discovered in a course, not yet classified or fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    /// Canvas file id, absent for external links.
    pub remote_id: Option<u64>,
    /// Name shown in Canvas. Never empty.
    pub display_name: String,
    pub mime_type: Option<String>,
    pub content_url: String,
    /// Directory the file is saved into.
    pub destination: PathBuf,
    pub course_name: String,
    /// Human label of the container the file was found in.
    pub container: String,
}

/// A container whose listing failed during the walk.
#[derive(Debug)]
pub struct ContainerFailure {
    pub course_name: String,
    pub container: String,
    pub error: Error,
}

/// Item produced by [`walk`].
#[derive(Debug)]
pub enum WalkEvent {
    File(FileReference),
    ContainerFailed(ContainerFailure),
}

/// What to visit within a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkPlan {
    pub modules: bool,
    pub folders: bool,
    pub submissions: bool,
}

impl WalkPlan {
    /// Builds the plan for a container mode.
    ///
    /// Submissions are visited in `submissions` mode and, for every other
    /// mode, whenever `include_submissions` is set.
    #[must_use]
    pub const fn new(mode: ContainerMode, include_submissions: bool) -> Self {
        match mode {
            ContainerMode::Modules => Self {
                modules: true,
                folders: false,
                submissions: include_submissions,
            },
            ContainerMode::Folders => Self {
                modules: false,
                folders: true,
                submissions: include_submissions,
            },
            ContainerMode::Both => Self {
                modules: true,
                folders: true,
                submissions: include_submissions,
            },
            ContainerMode::Submissions => Self {
                modules: false,
                folders: false,
                submissions: true,
            },
        }
    }
}

enum Task {
    ListModules,
    ModuleItems(Module),
    ModuleFile { module: String, item: ModuleItem },
    ListFolders,
    FolderFiles { folder: Folder, segments: Vec<String> },
    ListSubmissions,
}

struct Walk<'a, A: ?Sized> {
    api: &'a A,
    course: &'a Course,
    user_id: &'a str,
    course_name: String,
    course_dir: PathBuf,
    tasks: VecDeque<Task>,
    ready: VecDeque<WalkEvent>,
}

/// Walks `course`, yielding every file reference and every container
/// failure. Each call starts a fresh traversal.
///
/// Modules are visited before folders and folders before submissions. A
/// failed listing produces a [`WalkEvent::ContainerFailed`] and the walk
/// moves on to the next container.
pub fn walk<'a, A: CanvasApi + ?Sized>(
    api: &'a A,
    course: &'a Course,
    user_id: &'a str,
    plan: WalkPlan,
    output_root: &Path,
) -> impl Stream<Item = WalkEvent> + Send + use<'a, A> {
    let course_name = course.display_name().to_string();
    let course_dir = output_root.join(sanitize(&course_name));

    let mut tasks = VecDeque::new();
    if plan.modules {
        tasks.push_back(Task::ListModules);
    }
    if plan.folders {
        tasks.push_back(Task::ListFolders);
    }
    if plan.submissions {
        tasks.push_back(Task::ListSubmissions);
    }

    let state = Walk {
        api,
        course,
        user_id,
        course_name,
        course_dir,
        tasks,
        ready: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((event, state));
            }
            let task = state.tasks.pop_front()?;
            state.run(task).await;
        }
    })
}

impl<A: CanvasApi + ?Sized> Walk<'_, A> {
    async fn run(&mut self, task: Task) {
        match task {
            Task::ListModules => self.list_modules().await,
            Task::ModuleItems(module) => self.module_items(module).await,
            Task::ModuleFile { module, item } => self.module_file(&module, item).await,
            Task::ListFolders => self.list_folders().await,
            Task::FolderFiles { folder, segments } => self.folder_files(&folder, segments).await,
            Task::ListSubmissions => self.list_submissions().await,
        }
    }

    /// Queues child tasks ahead of the remaining work, preserving their order.
    fn push_children(&mut self, children: Vec<Task>) {
        for task in children.into_iter().rev() {
            self.tasks.push_front(task);
        }
    }

    fn fail(&mut self, container: String, error: Error) {
        log::warn!(
            "{}: could not list {container}: {error}",
            self.course_name
        );
        self.ready.push_back(WalkEvent::ContainerFailed(ContainerFailure {
            course_name: self.course_name.clone(),
            container,
            error,
        }));
    }

    fn emit(&mut self, file: &File, url: String, dir: PathBuf, container: &str) {
        let display_name = file.name();
        let display_name = if display_name.trim().is_empty() {
            format!("file-{}", file.id)
        } else {
            display_name.to_string()
        };
        self.ready.push_back(WalkEvent::File(FileReference {
            remote_id: Some(file.id),
            display_name,
            mime_type: file.content_type.clone(),
            content_url: url,
            destination: dir,
            course_name: self.course_name.clone(),
            container: container.to_string(),
        }));
    }

    async fn list_modules(&mut self) {
        match self.api.list_modules(self.course.id).await {
            Ok(modules) => {
                let children = modules
                    .into_iter()
                    .filter(|m| m.items_count != Some(0))
                    .map(Task::ModuleItems)
                    .collect();
                self.push_children(children);
            }
            Err(e) => self.fail("modules".to_string(), e),
        }
    }

    async fn module_items(&mut self, module: Module) {
        let label = format!("module '{}'", module.name);
        match self.api.list_module_items(self.course.id, module.id).await {
            Ok(items) => {
                let children = items
                    .into_iter()
                    .filter_map(|item| match item.kind {
                        ModuleItemKind::File if item.content_id.is_some() => Some(item),
                        ModuleItemKind::ExternalUrl
                            if item.external_url.as_deref().is_some_and(is_shared_link) =>
                        {
                            Some(item)
                        }
                        _ => None,
                    })
                    .map(|item| Task::ModuleFile {
                        module: label.clone(),
                        item,
                    })
                    .collect();
                self.push_children(children);
            }
            Err(e) => self.fail(label, e),
        }
    }

    async fn module_file(&mut self, module: &str, item: ModuleItem) {
        let dir = self.course_dir.clone();
        if item.kind == ModuleItemKind::ExternalUrl {
            let Some(url) = item.external_url else { return };
            let display_name = if item.title.trim().is_empty() {
                format!("link-{}", item.id)
            } else {
                item.title
            };
            self.ready.push_back(WalkEvent::File(FileReference {
                remote_id: None,
                display_name,
                mime_type: None,
                content_url: url,
                destination: dir,
                course_name: self.course_name.clone(),
                container: module.to_string(),
            }));
            return;
        }

        let Some(file_id) = item.content_id else { return };
        match self.api.get_file(self.course.id, file_id).await {
            Ok(file) => match file.url.clone() {
                Some(url) => self.emit(&file, url, dir, module),
                None => log::info!("{}: skipping locked file {}", self.course_name, file.name()),
            },
            Err(e) => self.fail(format!("{module} item '{}'", item.title), e),
        }
    }

    async fn list_folders(&mut self) {
        let folders = match self.api.list_folders(self.course.id).await {
            Ok(folders) => folders,
            Err(e) => return self.fail("folders".to_string(), e),
        };
        let children = folder_tasks(folders);
        self.push_children(children);
    }

    async fn folder_files(&mut self, folder: &Folder, segments: Vec<String>) {
        let label = if segments.is_empty() {
            "folder '/'".to_string()
        } else {
            format!("folder '{}'", segments.join("/"))
        };
        let mut dir = self.course_dir.clone();
        dir.extend(&segments);

        match self.api.list_folder_files(folder.id).await {
            Ok(files) => {
                for file in files {
                    match file.url.clone() {
                        Some(url) => self.emit(&file, url, dir.clone(), &label),
                        None => log::info!(
                            "{}: skipping locked file {}",
                            self.course_name,
                            file.name()
                        ),
                    }
                }
            }
            Err(e) => self.fail(label, e),
        }
    }

    async fn list_submissions(&mut self) {
        let submissions = match self
            .api
            .list_submissions(self.course.id, self.user_id)
            .await
        {
            Ok(submissions) => submissions,
            Err(e) => return self.fail("submissions".to_string(), e),
        };
        let dir = self.course_dir.join(SUBMISSIONS_DIR);
        for submission in submissions.into_iter().filter(|s| s.is_submitted()) {
            for file in submission.attachments.unwrap_or_default() {
                if let Some(url) = file.url.clone() {
                    self.emit(&file, url, dir.clone(), "submissions");
                }
            }
        }
    }
}

/// Orders a flat folder listing into a depth-first traversal from the
/// root folder, pairing each folder that holds files with its sanitized
/// path below the course directory.
///
/// Uses an explicit stack, so arbitrarily deep trees are fine. Folders
/// unreachable from a root are ignored.
fn folder_tasks(folders: Vec<Folder>) -> Vec<Task> {
    let mut children: HashMap<Option<u64>, Vec<Folder>> = HashMap::new();
    for folder in folders {
        children.entry(folder.parent_folder_id).or_default().push(folder);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| a.name.cmp(&b.name));
    }

    let mut stack: Vec<(Folder, Vec<String>)> = children
        .remove(&None)
        .unwrap_or_default()
        .into_iter()
        .rev()
        .map(|root| (root, Vec::new()))
        .collect();

    let mut tasks = Vec::new();
    while let Some((folder, segments)) = stack.pop() {
        if let Some(subfolders) = children.remove(&Some(folder.id)) {
            for sub in subfolders.into_iter().rev() {
                let mut path = segments.clone();
                path.push(sanitize(&sub.name));
                stack.push((sub, path));
            }
        }
        if folder.files_count > 0 {
            tasks.push(Task::FolderFiles { folder, segments });
        }
    }
    tasks
}
