//! Uploads and deletions against the external media service.
//!
//! Every failure is logged and degrades to an empty result; media problems
//! never abort the catalog operation that triggered them.

use async_trait::async_trait;
use edu_models::{MediaConfig, UploadedFile};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Thumbnail,
    Video,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Thumbnail => "thumbnail",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDeleteReport {
    #[serde(default)]
    pub deleted: Vec<String>,
    #[serde(default)]
    pub failed: Vec<String>,
}

impl BatchDeleteReport {
    pub fn all_failed(urls: &[String]) -> Self {
        Self {
            deleted: Vec::new(),
            failed: urls.to_vec(),
        }
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Public URL of the stored file, `None` on failure.
    async fn upload(&self, kind: MediaKind, file: &UploadedFile, user_id: &str) -> Option<String>;

    async fn delete(&self, url_or_key: &str) -> bool;

    async fn delete_batch(&self, urls: &[String]) -> BatchDeleteReport;

    /// Uploads documents one by one, keeping the URLs of those that succeeded.
    async fn upload_documents(&self, files: &[UploadedFile], user_id: &str) -> Vec<String> {
        let mut urls = Vec::with_capacity(files.len());
        for file in files {
            match self.upload(MediaKind::Document, file, user_id).await {
                Some(url) => urls.push(url),
                None => warn!(file = %file.file_name, "Skipping document that failed to upload"),
            }
        }
        urls
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    url_or_key: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchDeleteRequest<'a> {
    urls: &'a [String],
}

/// HTTP implementation of [`MediaStore`].
#[derive(Debug, Clone)]
pub struct MediaClient {
    client: reqwest::Client,
    base_url: String,
}

impl MediaClient {
    pub fn new(config: &MediaConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl MediaStore for MediaClient {
    async fn upload(&self, kind: MediaKind, file: &UploadedFile, user_id: &str) -> Option<String> {
        let mut part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone());
        if let Some(content_type) = &file.content_type {
            part = match part.mime_str(content_type) {
                Ok(p) => p,
                Err(e) => {
                    warn!(content_type = %content_type, "Ignoring invalid content type: {}", e);
                    reqwest::multipart::Part::bytes(file.bytes.clone())
                        .file_name(file.file_name.clone())
                }
            };
        }
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("user_id", user_id.to_string());

        let endpoint = format!("/api/upload/{}", kind.as_str());
        let result = self
            .client
            .post(self.url(&endpoint))
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!(kind = kind.as_str(), file = %file.file_name, "Media upload failed: {}", e);
                return None;
            }
        };
        match response.json::<UploadResponse>().await {
            Ok(body) => {
                if let Some(url) = &body.url {
                    info!(kind = kind.as_str(), url = %url, "Uploaded media");
                }
                body.url
            }
            Err(e) => {
                error!(kind = kind.as_str(), "Invalid media upload response: {}", e);
                None
            }
        }
    }

    async fn delete(&self, url_or_key: &str) -> bool {
        if url_or_key.is_empty() {
            return false;
        }
        let result = self
            .client
            .delete(self.url("/api/delete"))
            .json(&DeleteRequest { url_or_key })
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match result {
            Ok(response) => response
                .json::<DeleteResponse>()
                .await
                .map(|body| body.success)
                .unwrap_or(false),
            Err(e) => {
                error!(target_url = %url_or_key, "Media delete failed: {}", e);
                false
            }
        }
    }

    async fn delete_batch(&self, urls: &[String]) -> BatchDeleteReport {
        if urls.is_empty() {
            return BatchDeleteReport::default();
        }
        let result = self
            .client
            .delete(self.url("/api/delete/batch"))
            .json(&BatchDeleteRequest { urls })
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match result {
            Ok(response) => match response.json::<BatchDeleteReport>().await {
                Ok(report) => report,
                Err(e) => {
                    error!("Invalid batch delete response: {}", e);
                    BatchDeleteReport::all_failed(urls)
                }
            },
            Err(e) => {
                error!(count = urls.len(), "Media batch delete failed: {}", e);
                BatchDeleteReport::all_failed(urls)
            }
        }
    }
}
