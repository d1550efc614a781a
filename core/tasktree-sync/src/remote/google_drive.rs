//! Google Drive storage implementation.
//!
//! Uses Google Drive API v3 for file operations.

use super::{RemoteFile, RemoteStore};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const MULTIPART_BOUNDARY: &str = "tasktree_boundary_2024";

/// Google Drive specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleDriveConfig {
    /// Base URL for Google Drive API (e.g. `https://www.googleapis.com`).
    pub api_base_url: String,
    /// Timeout applied by the HTTP client to every request (seconds).
    pub http_timeout_secs: u64,
}

impl Default for GoogleDriveConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com".to_string(),
            http_timeout_secs: 60,
        }
    }
}

/// Google Drive API response structures.
#[derive(Debug, Deserialize)]
struct DriveFileList {
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(rename = "modifiedTime")]
    modified_time: Option<String>,
}

/// Google Drive storage implementation.
pub struct GoogleDriveStore {
    config: GoogleDriveConfig,
    client: Client,
}

impl GoogleDriveStore {
    /// Creates a new Google Drive store.
    pub fn new(config: GoogleDriveConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GoogleDriveConfig {
        &self.config
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.config.api_base_url)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!(
            "{}/drive/v3/files/{}",
            self.config.api_base_url,
            urlencoding::encode(file_id)
        )
    }

    fn upload_url(&self, file_id: Option<&str>) -> String {
        match file_id {
            Some(id) => format!(
                "{}/upload/drive/v3/files/{}",
                self.config.api_base_url,
                urlencoding::encode(id)
            ),
            None => format!("{}/upload/drive/v3/files", self.config.api_base_url),
        }
    }
}

/// Maps a non-success status to the sync error taxonomy.
async fn check_status(response: Response, operation: &str) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::Auth(format!(
            "{operation} rejected with {status}: {body}"
        ))),
        _ => Err(SyncError::Transport(format!(
            "{operation} failed with {status}: {body}"
        ))),
    }
}

fn parse_modified_time(raw: &str) -> SyncResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SyncError::Transport(format!("invalid modifiedTime {raw:?}: {e}")))
}

fn drive_file_to_remote_file(file: DriveFile) -> SyncResult<RemoteFile> {
    let modified_time = file
        .modified_time
        .as_deref()
        .map(parse_modified_time)
        .transpose()?;

    Ok(RemoteFile {
        id: file.id,
        modified_time,
    })
}

/// Builds a `multipart/related` body: JSON metadata part, then the document.
fn multipart_body(file_name: &str, payload: &[u8]) -> Vec<u8> {
    let metadata = serde_json::json!({
        "name": file_name,
        "mimeType": "application/json",
    });

    let boundary = MULTIPART_BOUNDARY;
    let mut body = Vec::with_capacity(payload.len() + 256);
    body.extend_from_slice(format!(
        "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: application/json\r\n\r\n"
    ).as_bytes());
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{boundary}--").as_bytes());
    body
}

#[async_trait]
impl RemoteStore for GoogleDriveStore {
    fn provider_name(&self) -> &'static str {
        "Google Drive"
    }

    async fn locate(&self, token: &str, file_name: &str) -> SyncResult<Option<RemoteFile>> {
        let query = format!(
            "name = '{}' and trashed = false",
            file_name.replace('\\', "\\\\").replace('\'', "\\'")
        );

        let response = self
            .client
            .get(self.files_url())
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("fields", "files(id,modifiedTime)")])
            .send()
            .await?;
        let response = check_status(response, "file search").await?;

        let file_list: DriveFileList = response
            .json()
            .await
            .map_err(|e| SyncError::Transport(format!("failed to parse file list: {e}")))?;

        if file_list.files.len() > 1 {
            debug!(
                "{} files named {} found, using the first",
                file_list.files.len(),
                file_name
            );
        }

        file_list
            .files
            .into_iter()
            .next()
            .map(drive_file_to_remote_file)
            .transpose()
    }

    async fn read_metadata(&self, token: &str, file_id: &str) -> SyncResult<DateTime<Utc>> {
        let response = self
            .client
            .get(self.file_url(file_id))
            .bearer_auth(token)
            .query(&[("fields", "id,modifiedTime")])
            .send()
            .await?;
        let response = check_status(response, "metadata read").await?;

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| SyncError::Transport(format!("failed to parse metadata: {e}")))?;

        let raw = file
            .modified_time
            .ok_or_else(|| SyncError::Transport(format!("no modifiedTime for file {file_id}")))?;
        parse_modified_time(&raw)
    }

    async fn read_content(&self, token: &str, file_id: &str) -> SyncResult<Vec<u8>> {
        debug!("Downloading file: {}", file_id);

        let response = self
            .client
            .get(self.file_url(file_id))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        let response = check_status(response, "download").await?;

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn write(
        &self,
        token: &str,
        file_id: Option<&str>,
        file_name: &str,
        payload: &[u8],
    ) -> SyncResult<(String, DateTime<Utc>)> {
        debug!("Uploading file: {} ({} bytes)", file_name, payload.len());

        let url = self.upload_url(file_id);
        let request = match file_id {
            Some(_) => self.client.patch(url),
            None => self.client.post(url),
        };

        let response = request
            .bearer_auth(token)
            .query(&[("uploadType", "multipart"), ("fields", "id,modifiedTime")])
            .header(
                "Content-Type",
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(multipart_body(file_name, payload))
            .send()
            .await?;
        let response = check_status(response, "upload").await?;

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| SyncError::Transport(format!("failed to parse upload response: {e}")))?;
        let file = drive_file_to_remote_file(file)?;

        let modified = match file.modified_time {
            Some(modified) => modified,
            None => self.read_metadata(token, &file.id).await?,
        };

        match file_id {
            Some(_) => info!("Overwrote {} (id: {})", file_name, file.id),
            None => info!("Created {} (id: {})", file_name, file.id),
        }
        Ok((file.id, modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_body_has_both_parts() {
        let body = multipart_body("TaskTree.json", br#"{"items":[]}"#);
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--tasktree_boundary_2024\r\n"));
        assert!(text.contains(r#""name":"TaskTree.json""#));
        assert!(text.contains(r#""mimeType":"application/json""#));
        assert!(text.contains(r#"{"items":[]}"#));
        assert!(text.ends_with("\r\n--tasktree_boundary_2024--"));
    }

    #[test]
    fn modified_time_parses_rfc3339() {
        let ts = parse_modified_time("2024-01-01T00:00:03.250Z").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_704_067_203_250);
        assert!(parse_modified_time("yesterday").is_err());
    }
}
