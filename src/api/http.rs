use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{AUTHORIZATION, HeaderMap, LINK};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use super::CanvasApi;
use super::types::{Course, ErrorBody, File, Folder, Module, ModuleItem, Submission};
use crate::error::{Error, Result};

static NEXT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).expect("valid regex"));

const PER_PAGE: &str = "100";

/// Canvas API client authenticated with a personal access token.
#[derive(Debug, Clone)]
pub struct HttpCanvasClient {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpCanvasClient {
    /// Creates a client for `domain`.
    ///
    /// A bare domain such as `school.instructure.com` is reached over
    /// HTTPS; a value that already carries a scheme is used as-is.
    #[must_use]
    pub fn new(http: Client, domain: &str, token: impl Into<String>) -> Self {
        let domain = domain.trim_end_matches('/');
        let root = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        };
        Self {
            http,
            base_url: format!("{root}/api/v1"),
            token: token.into(),
        }
    }

    /// Returns the API root, e.g. `https://school.instructure.com/api/v1`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        log::debug!("GET {url}");
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.errors.into_iter().next())
            .map(|m| m.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| url.clone());

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(message),
            StatusCode::NOT_FOUND => Error::NotFound(message),
            _ => Error::Status {
                status: status.as_u16(),
                url,
            },
        })
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{path}", self.base_url);
        let response = self.send(&url, &[]).await?;
        Ok(response.json().await?)
    }

    /// Fetches every page of a list endpoint.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let first = format!("{}/{path}", self.base_url);
        let mut query: Vec<(&str, &str)> = query.to_vec();
        query.push(("per_page", PER_PAGE));

        let mut response = self.send(&first, &query).await?;
        let mut items = Vec::new();
        loop {
            let next = next_link(response.headers());
            let page: Vec<T> = response.json().await?;
            items.extend(page);
            match next {
                // The next link already carries every query parameter.
                Some(url) => response = self.send(&url, &[]).await?,
                None => break,
            }
        }
        Ok(items)
    }
}

/// Extracts the `rel="next"` target from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| NEXT_LINK_RE.captures(v).map(|c| c[1].to_string()))
}

#[async_trait]
impl CanvasApi for HttpCanvasClient {
    async fn list_favorite_courses(&self) -> Result<Vec<Course>> {
        self.get_all("users/self/favorites/courses", &[]).await
    }

    async fn list_all_courses(&self) -> Result<Vec<Course>> {
        self.get_all("courses", &[("include[]", "favorites")])
            .await
    }

    async fn list_modules(&self, course_id: u64) -> Result<Vec<Module>> {
        self.get_all(&format!("courses/{course_id}/modules"), &[])
            .await
    }

    async fn list_module_items(&self, course_id: u64, module_id: u64) -> Result<Vec<ModuleItem>> {
        self.get_all(
            &format!("courses/{course_id}/modules/{module_id}/items"),
            &[],
        )
        .await
    }

    async fn get_file(&self, course_id: u64, file_id: u64) -> Result<File> {
        self.get_one(&format!("courses/{course_id}/files/{file_id}"))
            .await
    }

    async fn list_folders(&self, course_id: u64) -> Result<Vec<Folder>> {
        self.get_all(&format!("courses/{course_id}/folders"), &[])
            .await
    }

    async fn list_folder_files(&self, folder_id: u64) -> Result<Vec<File>> {
        self.get_all(&format!("folders/{folder_id}/files"), &[])
            .await
    }

    async fn list_submissions(&self, course_id: u64, user_id: &str) -> Result<Vec<Submission>> {
        self.get_all(
            &format!("courses/{course_id}/students/submissions"),
            &[("student_ids[]", user_id)],
        )
        .await
    }
}
