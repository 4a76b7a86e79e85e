//! Remote backup store interface and the Google Drive adapter.
//!
//! The core consumes the remote side through the narrow [`RemoteStore`]
//! trait: upload, download, find-by-name, and paginated listing. Every
//! call is fallible with a typed [`RemoteError`]; nothing past this
//! boundary is allowed to panic the caller. The sync engine treats all
//! of it as unreliable and counts failures instead of raising.

pub mod client;
pub mod error;

use async_trait::async_trait;
use serde::Deserialize;

pub use client::DriveClient;
pub use error::RemoteError;

/// Descriptor for one remote object.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
}

/// One bounded page of remote descriptors.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub files: Vec<RemoteFileMeta>,
    /// Token for the next page; `None` means the listing is exhausted.
    pub next_page_token: Option<String>,
}

/// Best-effort remote object store, keyed by file name within a folder.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload content under a name, replacing any existing object with
    /// that name. Returns the remote object id.
    async fn upload(&self, content: &str, name: &str, folder: &str)
        -> Result<String, RemoteError>;

    /// Download an object's content by id.
    async fn download(&self, id: &str) -> Result<String, RemoteError>;

    /// Find an object by exact name. Absence is `Ok(None)`, not an error.
    async fn find_by_name(
        &self,
        name: &str,
        folder: &str,
    ) -> Result<Option<RemoteFileMeta>, RemoteError>;

    /// Fetch one bounded page of descriptors.
    async fn list_page(
        &self,
        folder: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<ListPage, RemoteError>;
}
