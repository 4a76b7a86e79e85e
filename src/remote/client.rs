//! Google Drive v3 adapter for the remote backup store.
//!
//! Backups are plain JSON files in one Drive folder, addressed by name.
//! Uploads use the resumable protocol for new objects and a media
//! update for existing ones; the body is streamed from memory, so no
//! staging files are involved.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{ListPage, RemoteError, RemoteFileMeta, RemoteStore};

/// Base URL for Drive metadata and download endpoints
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Base URL for Drive upload endpoints
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// HTTP request timeout in seconds.
/// 30s allows for slow uploads while failing fast enough that a sync
/// run does not hang on one file.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Descriptor fields requested from the files.list endpoint
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,createdTime)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<RemoteFileMeta>,
}

#[derive(Debug, Deserialize)]
struct FileResource {
    id: String,
}

/// Drive-backed remote store.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct DriveClient {
    client: Client,
    token: String,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Create a client with a bearer token. Token acquisition (service
    /// account or OAuth flow) is the caller's concern.
    pub fn new(token: impl Into<String>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        })
    }

    /// Point the client at alternate endpoints (local test servers).
    pub fn with_base_urls(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    /// Escape a value for embedding in a Drive query string.
    fn escape_query_value(value: &str) -> String {
        value.replace('\\', "\\\\").replace('\'', "\\'")
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(RemoteError::from_status(status, &body))
        }
    }

    async fn create_file(
        &self,
        content: &str,
        name: &str,
        folder: &str,
    ) -> Result<String, RemoteError> {
        // Resumable upload: initiate with metadata, then send the body
        // to the session URL Drive hands back.
        let metadata = serde_json::json!({
            "name": name,
            "parents": [folder],
            "mimeType": "application/json",
        });

        let response = self
            .client
            .post(format!("{}/files?uploadType=resumable", self.upload_base))
            .bearer_auth(&self.token)
            .header("X-Upload-Content-Type", "application/json")
            .json(&metadata)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let session_url = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                RemoteError::InvalidResponse("Resumable upload returned no session URL".to_string())
            })?
            .to_string();

        let response = self
            .client
            .put(&session_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(content.to_string())
            .send()
            .await?;
        let response = Self::check(response).await?;

        let file: FileResource = response.json().await?;
        Ok(file.id)
    }

    async fn update_file(&self, content: &str, id: &str) -> Result<String, RemoteError> {
        let response = self
            .client
            .patch(format!(
                "{}/files/{}?uploadType=media",
                self.upload_base, id
            ))
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(content.to_string())
            .send()
            .await?;
        let response = Self::check(response).await?;
        let file: FileResource = response.json().await?;
        Ok(file.id)
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn upload(
        &self,
        content: &str,
        name: &str,
        folder: &str,
    ) -> Result<String, RemoteError> {
        // Same-name uploads replace the existing object so the folder
        // never accumulates duplicates of singleton documents.
        let id = match self.find_by_name(name, folder).await? {
            Some(existing) => self.update_file(content, &existing.id).await?,
            None => self.create_file(content, name, folder).await?,
        };
        debug!(name, id = %id, "Uploaded file to Drive");
        Ok(id)
    }

    async fn download(&self, id: &str) -> Result<String, RemoteError> {
        let response = self
            .client
            .get(format!("{}/files/{}?alt=media", self.api_base, id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.text().await?)
    }

    async fn find_by_name(
        &self,
        name: &str,
        folder: &str,
    ) -> Result<Option<RemoteFileMeta>, RemoteError> {
        let query = format!(
            "name = '{}' and '{}' in parents and trashed = false",
            Self::escape_query_value(name),
            Self::escape_query_value(folder)
        );
        let response = self
            .client
            .get(format!("{}/files", self.api_base))
            .bearer_auth(&self.token)
            .query(&[("q", query.as_str()), ("fields", "files(id,name)")])
            .send()
            .await?;
        let response = Self::check(response).await?;
        let list: FileListResponse = response.json().await?;
        Ok(list.files.into_iter().next())
    }

    async fn list_page(
        &self,
        folder: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<ListPage, RemoteError> {
        let query = format!(
            "'{}' in parents and trashed = false",
            Self::escape_query_value(folder)
        );
        let page_size = page_size.to_string();
        let mut params = vec![
            ("q", query.as_str()),
            ("pageSize", page_size.as_str()),
            ("fields", LIST_FIELDS),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let response = self
            .client
            .get(format!("{}/files", self.api_base))
            .bearer_auth(&self.token)
            .query(&params)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let list: FileListResponse = response.json().await?;
        Ok(ListPage {
            files: list.files,
            next_page_token: list.next_page_token,
        })
    }
}
