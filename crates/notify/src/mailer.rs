use async_trait::async_trait;
use edu_models::{EduError, NotifyConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Delivers one message to many recipients. Recipients are hidden from each
/// other (BCC) and sent in batches; one message id is returned per batch.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<Vec<String>, EduError>;
}

fn require_sender(sender: &Option<String>) -> Result<&str, EduError> {
    sender
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| EduError::MailerError {
            reason: "sender address is not configured".to_string(),
        })
}

/// Writes every batch to the log instead of delivering it.
#[derive(Debug, Clone)]
pub struct LogMailer {
    sender: Option<String>,
    batch_size: usize,
}

impl LogMailer {
    pub fn new(sender: Option<String>, batch_size: usize) -> Self {
        Self {
            sender,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<Vec<String>, EduError> {
        if message.recipients.is_empty() {
            return Ok(Vec::new());
        }
        let sender = require_sender(&self.sender)?;

        let mut ids = Vec::new();
        for (index, batch) in message.recipients.chunks(self.batch_size).enumerate() {
            let id = format!("local-{}", uuid::Uuid::new_v4());
            info!(
                from = %sender,
                batch = index,
                recipients = batch.len(),
                subject = %message.subject,
                message_id = %id,
                "Mail batch accepted"
            );
            ids.push(id);
        }
        Ok(ids)
    }
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    bcc: &'a [String],
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    message_id: String,
}

/// Posts each batch as JSON to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct RelayMailer {
    client: reqwest::Client,
    url: String,
    sender: Option<String>,
    batch_size: usize,
}

impl RelayMailer {
    pub fn new(url: impl Into<String>, sender: Option<String>, batch_size: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
            sender,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, message: &MailMessage) -> Result<Vec<String>, EduError> {
        if message.recipients.is_empty() {
            return Ok(Vec::new());
        }
        let sender = require_sender(&self.sender)?;
        let html = message.html.as_deref().unwrap_or(&message.text);

        let mut ids = Vec::new();
        for (index, batch) in message.recipients.chunks(self.batch_size).enumerate() {
            let body = RelayRequest {
                from: sender,
                to: vec![sender],
                bcc: batch,
                subject: &message.subject,
                text: &message.text,
                html,
            };
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| {
                    error!(batch = index, "Mail relay request failed: {}", e);
                    EduError::MailerError {
                        reason: e.to_string(),
                    }
                })?;
            let parsed: RelayResponse = response.json().await.map_err(|e| EduError::MailerError {
                reason: format!("invalid relay response: {e}"),
            })?;
            info!(batch = index, recipients = batch.len(), message_id = %parsed.message_id, "Mail batch relayed");
            ids.push(parsed.message_id);
        }
        Ok(ids)
    }
}

/// Relay when a URL is configured, log otherwise.
pub fn mailer_from_config(config: &NotifyConfig) -> Arc<dyn Mailer> {
    match config.relay_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => Arc::new(RelayMailer::new(
            url,
            config.sender.clone(),
            config.batch_size,
        )),
        None => Arc::new(LogMailer::new(config.sender.clone(), config.batch_size)),
    }
}
