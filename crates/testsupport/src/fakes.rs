use async_trait::async_trait;
use edu_media::{BatchDeleteReport, MediaKind, MediaStore};
use edu_models::{EduError, UploadedFile};
use edu_notify::{MailMessage, Mailer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const FAKE_MEDIA_HOST: &str = "https://media.test";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub kind: MediaKind,
    pub file_name: String,
    pub user_id: String,
    pub url: String,
}

/// In-memory media service. Uploads get a deterministic URL under
/// [`FAKE_MEDIA_HOST`]; every call is recorded for assertions.
#[derive(Debug, Default)]
pub struct FakeMediaStore {
    uploads: Mutex<Vec<RecordedUpload>>,
    deleted: Mutex<Vec<String>>,
    fail_uploads: AtomicBool,
}

impl FakeMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_for(kind: MediaKind, user_id: &str, file_name: &str) -> String {
        format!("{FAKE_MEDIA_HOST}/{}/{user_id}/{file_name}", kind.as_str())
    }

    /// Makes every following upload fail.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn record_delete(&self, url: &str) {
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(url.to_string());
        }
    }
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    async fn upload(&self, kind: MediaKind, file: &UploadedFile, user_id: &str) -> Option<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return None;
        }
        let url = Self::url_for(kind, user_id, &file.file_name);
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push(RecordedUpload {
                kind,
                file_name: file.file_name.clone(),
                user_id: user_id.to_string(),
                url: url.clone(),
            });
        }
        Some(url)
    }

    async fn delete(&self, url_or_key: &str) -> bool {
        self.record_delete(url_or_key);
        true
    }

    async fn delete_batch(&self, urls: &[String]) -> BatchDeleteReport {
        for url in urls {
            self.record_delete(url);
        }
        BatchDeleteReport {
            deleted: urls.to_vec(),
            failed: Vec::new(),
        }
    }
}

/// Mailer that keeps every message instead of delivering it.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail with a mailer error.
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<Vec<String>, EduError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EduError::MailerError {
                reason: "relay unavailable".to_string(),
            });
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|e| EduError::internal(e.to_string()))?;
        sent.push(message.clone());
        Ok(vec![format!("test-message-{}", sent.len())])
    }
}
