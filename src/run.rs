//! Course selection, per-file fan-out and aggregation into a [`RunReport`].

use std::pin::pin;
use std::sync::Arc;

use futures::StreamExt;

use crate::api::{CanvasApi, Course, HttpCanvasClient};
use crate::config::{DownloadConfig, RunOptions};
use crate::dispatch::{Dispatcher, DownloadProgress};
use crate::error::{FailureKind, Result};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::index::{Claim, ExistingFileIndex};
use crate::link::{DriveResolver, LinkResolver, resolve};
use crate::report::{Outcome, RunReport, RunReportBuilder};
use crate::walker::{ContainerFailure, FileReference, WalkEvent, WalkPlan, walk};

/// A walk event after it has been fully handled.
enum Settled {
    File(FileReference, Outcome),
    Container(ContainerFailure),
}

/// Drives a complete mirror run over a Canvas API, a link resolver and a
/// file system.
pub struct Coordinator<A, R, F = TokioFileSystem>
where
    A: CanvasApi,
    R: LinkResolver,
    F: FileSystem,
{
    api: A,
    resolver: R,
    dispatcher: Dispatcher<F>,
    user_id: String,
    concurrent_files: usize,
}

impl<A, R, F> Coordinator<A, R, F>
where
    A: CanvasApi,
    R: LinkResolver,
    F: FileSystem,
{
    /// Creates a coordinator downloading on behalf of `user_id`.
    #[must_use]
    pub fn new(api: A, resolver: R, dispatcher: Dispatcher<F>, user_id: impl Into<String>) -> Self {
        Self {
            api,
            resolver,
            dispatcher,
            user_id: user_id.into(),
            concurrent_files: DownloadConfig::default().concurrent_files,
        }
    }

    /// Sets how many files are resolved and downloaded at once.
    #[must_use]
    pub fn with_concurrent_files(mut self, concurrent: usize) -> Self {
        self.concurrent_files = concurrent.max(1);
        self
    }

    /// Lists the courses a run visits: favourites, or every course when
    /// `all` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the course listing fails.
    pub async fn select_courses(&self, all: bool) -> Result<Vec<Course>> {
        let courses = if all {
            self.api.list_all_courses().await?
        } else {
            self.api.list_favorite_courses().await?
        };
        log::info!(
            "Found {} {}course(s)",
            courses.len(),
            if all { "" } else { "favourite " }
        );
        Ok(courses)
    }

    /// Mirrors every selected course into `options.output_dir`.
    ///
    /// Courses are processed one after another; within a course up to
    /// `concurrent_files` files are resolved and dispatched concurrently.
    /// A Canvas file reached through more than one container is fetched
    /// once; later references are `Skipped`. Per-file and per-container
    /// failures are recorded in the report.
    ///
    /// # Errors
    ///
    /// Returns an error only if the course listing fails.
    pub async fn run(
        &self,
        options: &RunOptions,
        progress: &Arc<dyn DownloadProgress>,
    ) -> Result<RunReport> {
        let mut report = RunReportBuilder::new();
        let courses = self.select_courses(options.all).await?;
        let index = ExistingFileIndex::new(Arc::clone(self.dispatcher.fs()));
        let plan = WalkPlan::new(options.from, options.include_submissions);

        for course in &courses {
            if course.access_restricted_by_date {
                log::info!(
                    "Skipping {}: access restricted by date",
                    course.display_name()
                );
                continue;
            }
            report.add_course();
            progress.on_course_start(course.display_name());

            let settled = walk(&self.api, course, &self.user_id, plan, &options.output_dir)
                .map(|event| self.settle(event, &index, progress))
                .buffer_unordered(self.concurrent_files);
            let mut settled = pin!(settled);

            while let Some(item) = settled.next().await {
                match item {
                    Settled::File(reference, outcome) => report.add_outcome(&reference, outcome),
                    Settled::Container(failure) => report.add_container_failure(failure),
                }
            }
        }

        let report = report.build();
        log::info!(
            "Run finished: {} downloaded, {} skipped, {} failed",
            report.downloaded,
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    async fn settle(
        &self,
        event: WalkEvent,
        index: &ExistingFileIndex<F>,
        progress: &Arc<dyn DownloadProgress>,
    ) -> Settled {
        let reference = match event {
            WalkEvent::File(reference) => reference,
            WalkEvent::ContainerFailed(failure) => return Settled::Container(failure),
        };

        let remote_claim = match reference.remote_id.map(|id| index.claim_remote(id)) {
            Some(Claim::Present) => {
                log::debug!(
                    "{}: file already handled from another container",
                    reference.display_name
                );
                progress.on_skipped(&reference.destination.join(&reference.display_name));
                return Settled::File(reference, Outcome::Skipped);
            }
            Some(Claim::Acquired(guard)) => Some(guard),
            None => None,
        };

        let outcome = match resolve(&reference, &self.resolver).await {
            Ok(download) => self.dispatcher.dispatch(&download, index, progress).await,
            Err(e) => {
                log::warn!("{}: {e}", reference.display_name);
                progress.on_error(
                    &reference.destination.join(&reference.display_name),
                    &e.to_string(),
                );
                Outcome::Failed {
                    kind: FailureKind::Resolution,
                    reason: e.to_string(),
                }
            }
        };

        // A failed reference leaves the id free for a later copy to retry.
        if let Some(guard) = remote_claim
            && !matches!(outcome, Outcome::Failed { .. })
        {
            guard.commit();
        }
        Settled::File(reference, outcome)
    }
}

/// Mirrors the user's courses from the Canvas instance at `domain`.
///
/// Builds one HTTP client from `config` and shares it between the Canvas
/// API, the Google Drive resolver and the dispatcher.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the course
/// listing fails (for example because the token is invalid).
pub async fn run(
    token: &str,
    domain: &str,
    user_id: &str,
    options: &RunOptions,
    config: &DownloadConfig,
    progress: Arc<dyn DownloadProgress>,
) -> Result<RunReport> {
    let http = config.build_http_client()?;
    let api = HttpCanvasClient::new(http.clone(), domain, token);
    log::debug!("Using Canvas API at {}", api.base_url());

    Coordinator::new(api, DriveResolver::new(http.clone()), Dispatcher::new(http), user_id)
        .with_concurrent_files(config.concurrent_files)
        .run(options, &progress)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::config::ContainerMode;
    use crate::dispatch::NoProgress;
    use crate::test_support::{FailingResolver, MockCanvas, course, folder, listed_file};
    use reqwest::Client;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn coordinator(api: MockCanvas) -> Coordinator<MockCanvas, FailingResolver> {
        Coordinator::new(api, FailingResolver, Dispatcher::new(Client::new()), "42")
    }

    fn no_progress() -> Arc<dyn DownloadProgress> {
        Arc::new(NoProgress)
    }

    fn options(dir: &Path, from: ContainerMode) -> RunOptions {
        RunOptions::new()
            .with_output_dir(dir)
            .with_from(from)
            .with_submissions(false)
    }

    async fn serve(server: &MockServer, route: &str, body: &[u8], times: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .expect(times)
            .mount(server)
            .await;
    }

    fn syllabus_course(server: &MockServer, favorite: bool) -> MockCanvas {
        let c = course(1, "CS 101: Intro!");
        let api = if favorite {
            MockCanvas::new().with_favorite(c)
        } else {
            MockCanvas::new().with_course(c)
        };
        api.with_modules(1, json!([{"id": 10, "name": "Week 1", "items_count": 1}]))
            .with_module_items(
                1,
                10,
                json!([{"id": 1, "title": "Syllabus", "type": "File", "content_id": 100}]),
            )
            .with_file(
                1,
                listed_file(100, "syllabus.pdf", &format!("{}/files/100", server.uri())),
            )
    }

    #[tokio::test]
    async fn favourite_module_file_is_downloaded() {
        let server = MockServer::start().await;
        serve(&server, "/files/100", b"syllabus", 1).await;
        let tmp = TempDir::new().unwrap();

        let report = coordinator(syllabus_course(&server, true))
            .run(&options(tmp.path(), ContainerMode::Modules), &no_progress())
            .await
            .unwrap();

        assert_eq!(
            (report.downloaded, report.skipped, report.failed),
            (1, 0, 0)
        );
        assert_eq!(report.courses, 1);
        let target = tmp.path().join("CS 101 Intro!/syllabus.pdf");
        assert_eq!(std::fs::read(target).unwrap(), b"syllabus");
    }

    #[tokio::test]
    async fn existing_file_is_skipped_when_listing_all_courses() {
        let server = MockServer::start().await;
        serve(&server, "/files/100", b"new", 0).await;
        let tmp = TempDir::new().unwrap();
        let course_dir = tmp.path().join("CS 101 Intro!");
        std::fs::create_dir_all(&course_dir).unwrap();
        std::fs::write(course_dir.join("syllabus.pdf"), b"old").unwrap();

        let opts = options(tmp.path(), ContainerMode::Modules).with_all(true);
        let report = coordinator(syllabus_course(&server, false))
            .run(&opts, &no_progress())
            .await
            .unwrap();

        assert_eq!(
            (report.downloaded, report.skipped, report.failed),
            (0, 1, 0)
        );
        assert_eq!(std::fs::read(course_dir.join("syllabus.pdf")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn favourites_exclude_other_courses() {
        let server = MockServer::start().await;
        serve(&server, "/files/100", b"x", 0).await;
        let tmp = TempDir::new().unwrap();

        let report = coordinator(syllabus_course(&server, false))
            .run(&options(tmp.path(), ContainerMode::Modules), &no_progress())
            .await
            .unwrap();

        assert_eq!(report.courses, 0);
        assert_eq!(report.total_files(), 0);
    }

    #[tokio::test]
    async fn second_run_downloads_nothing() {
        let server = MockServer::start().await;
        serve(&server, "/files/100", b"syllabus", 1).await;
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path(), ContainerMode::Modules);

        let first = coordinator(syllabus_course(&server, true))
            .run(&opts, &no_progress())
            .await
            .unwrap();
        let second = coordinator(syllabus_course(&server, true))
            .run(&opts, &no_progress())
            .await
            .unwrap();

        assert_eq!(first.downloaded, 1);
        assert_eq!(
            (second.downloaded, second.skipped, second.failed),
            (0, 1, 0)
        );
    }

    #[tokio::test]
    async fn file_in_module_and_root_folder_is_fetched_once() {
        let server = MockServer::start().await;
        serve(&server, "/files/100", b"syllabus", 1).await;
        let tmp = TempDir::new().unwrap();
        let url = format!("{}/files/100", server.uri());

        let api = syllabus_course(&server, true)
            .with_folders(1, vec![folder(1, "course files", None, 1)])
            .with_folder_files(1, vec![listed_file(100, "syllabus.pdf", &url)]);

        let report = coordinator(api)
            .with_concurrent_files(4)
            .run(&options(tmp.path(), ContainerMode::Both), &no_progress())
            .await
            .unwrap();

        assert_eq!(
            (report.downloaded, report.skipped, report.failed),
            (1, 1, 0)
        );
    }

    #[tokio::test]
    async fn file_in_module_and_subfolder_is_fetched_once() {
        let server = MockServer::start().await;
        serve(&server, "/files/100", b"syllabus", 1).await;
        let tmp = TempDir::new().unwrap();
        let url = format!("{}/files/100", server.uri());

        let api = syllabus_course(&server, true)
            .with_folders(
                1,
                vec![
                    folder(1, "course files", None, 0),
                    folder(2, "Labs", Some(1), 1),
                ],
            )
            .with_folder_files(2, vec![listed_file(100, "syllabus.pdf", &url)]);

        let report = coordinator(api)
            .with_concurrent_files(4)
            .run(&options(tmp.path(), ContainerMode::Both), &no_progress())
            .await
            .unwrap();

        assert_eq!(
            (report.downloaded, report.skipped, report.failed),
            (1, 1, 0)
        );
        let course_dir = tmp.path().join("CS 101 Intro!");
        let copies = [
            course_dir.join("syllabus.pdf"),
            course_dir.join("Labs/syllabus.pdf"),
        ]
        .iter()
        .filter(|p| p.exists())
        .count();
        assert_eq!(copies, 1);
    }

    #[tokio::test]
    async fn failed_download_leaves_no_partial_file() {
        let server = MockServer::start().await;
        serve(&server, "/files/1", b"good", 1).await;
        Mock::given(method("GET"))
            .and(path("/files/2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let tmp = TempDir::new().unwrap();

        let api = MockCanvas::new()
            .with_favorite(course(1, "Bio"))
            .with_folders(1, vec![folder(1, "course files", None, 2)])
            .with_folder_files(
                1,
                vec![
                    listed_file(1, "good.pdf", &format!("{}/files/1", server.uri())),
                    listed_file(2, "bad.pdf", &format!("{}/files/2", server.uri())),
                ],
            );

        let report = coordinator(api)
            .run(&options(tmp.path(), ContainerMode::Folders), &no_progress())
            .await
            .unwrap();

        assert_eq!((report.downloaded, report.failed), (1, 1));
        assert_eq!(report.failures[0].kind, FailureKind::Transport);
        assert_eq!(report.failures[0].display_name, "bad.pdf");
        let mut names: Vec<_> = std::fs::read_dir(tmp.path().join("Bio"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["good.pdf"]);
    }

    #[tokio::test]
    async fn failing_folder_does_not_affect_siblings() {
        let server = MockServer::start().await;
        serve(&server, "/files/5", b"y", 1).await;
        let tmp = TempDir::new().unwrap();

        let api = MockCanvas::new()
            .with_favorite(course(1, "Chem"))
            .with_folders(
                1,
                vec![
                    folder(1, "course files", None, 0),
                    folder(2, "X", Some(1), 1),
                    folder(3, "Y", Some(1), 1),
                ],
            )
            .with_failing_folder(2)
            .with_folder_files(
                3,
                vec![listed_file(5, "y.pdf", &format!("{}/files/5", server.uri()))],
            );

        let report = coordinator(api)
            .run(&options(tmp.path(), ContainerMode::Folders), &no_progress())
            .await
            .unwrap();

        assert_eq!((report.downloaded, report.failed), (1, 0));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, FailureKind::ContainerList);
        assert_eq!(report.failures[0].container, "folder 'X'");
        assert!(tmp.path().join("Chem/Y/y.pdf").is_file());
    }

    #[tokio::test]
    async fn unresolvable_shared_link_is_resolution_failure() {
        let tmp = TempDir::new().unwrap();
        let api = MockCanvas::new()
            .with_favorite(course(1, "Art"))
            .with_folders(1, vec![folder(1, "course files", None, 1)])
            .with_folder_files(
                1,
                vec![listed_file(
                    1,
                    "Reading",
                    "https://drive.google.com/file/d/abc123/view",
                )],
            );

        let report = coordinator(api)
            .run(&options(tmp.path(), ContainerMode::Folders), &no_progress())
            .await
            .unwrap();

        assert_eq!(
            (report.downloaded, report.skipped, report.failed),
            (0, 0, 1)
        );
        assert_eq!(report.failures[0].kind, FailureKind::Resolution);
        assert_eq!(report.failures[0].course, "Art");
    }

    #[tokio::test]
    async fn shared_link_downloads_under_resolved_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", "attachment; filename=\"reading.pdf\"")
                    .set_body_bytes(b"pdf".to_vec()),
            )
            .expect(2)
            .mount(&server)
            .await;
        let tmp = TempDir::new().unwrap();

        let api = MockCanvas::new()
            .with_favorite(course(1, "Art"))
            .with_modules(1, json!([{"id": 10, "name": "Week 1", "items_count": 1}]))
            .with_module_items(
                1,
                10,
                json!([{"id": 1, "title": "Reading", "type": "ExternalUrl",
                        "external_url": "https://drive.google.com/file/d/abc123/view"}]),
            );
        let resolver =
            DriveResolver::with_export_url(Client::new(), format!("{}/uc", server.uri()));
        let report = Coordinator::new(api, resolver, Dispatcher::new(Client::new()), "42")
            .run(&options(tmp.path(), ContainerMode::Modules), &no_progress())
            .await
            .unwrap();

        assert_eq!(report.downloaded, 1, "{:?}", report.failures);
        assert_eq!(std::fs::read(tmp.path().join("Art/reading.pdf")).unwrap(), b"pdf");
    }

    #[tokio::test]
    async fn submissions_land_in_their_own_directory() {
        let server = MockServer::start().await;
        serve(&server, "/files/8", b"essay", 1).await;
        let tmp = TempDir::new().unwrap();

        let api = MockCanvas::new()
            .with_favorite(course(1, "Lit"))
            .with_submissions(
                1,
                json!([{"id": 1, "workflow_state": "submitted",
                        "attachments": [{"id": 8, "display_name": "essay.docx",
                                         "url": format!("{}/files/8", server.uri())}]}]),
            );

        let report = coordinator(api)
            .run(
                &RunOptions::new()
                    .with_output_dir(tmp.path())
                    .with_from(ContainerMode::Submissions),
                &no_progress(),
            )
            .await
            .unwrap();

        assert_eq!(report.downloaded, 1);
        assert!(tmp.path().join("Lit/Submissions/essay.docx").is_file());
    }

    #[tokio::test]
    async fn restricted_courses_are_not_walked() {
        let tmp = TempDir::new().unwrap();
        let mut c = course(1, "Old");
        c.access_restricted_by_date = true;
        let api = MockCanvas::new().with_favorite(c);

        let report = coordinator(api)
            .run(&options(tmp.path(), ContainerMode::Both), &no_progress())
            .await
            .unwrap();

        assert_eq!(report.courses, 0);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn rejected_token_aborts_the_run() {
        let tmp = TempDir::new().unwrap();
        let api = MockCanvas::new().with_auth_failure("Invalid access token.");

        let err = coordinator(api)
            .run(&options(tmp.path(), ContainerMode::Both), &no_progress())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
        assert!(std::fs::read_dir(tmp.path()).unwrap().next().is_none());
    }
}
