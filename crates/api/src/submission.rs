//! Request bodies that may arrive as JSON, urlencoded forms or multipart
//! uploads. Text fields are collected into one JSON object and deserialized
//! on demand; uploaded files are kept aside by field name.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form,
};
use edu_models::{EduError, UploadedFile};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::ApiError;

#[derive(Debug, Clone, Default)]
pub struct Submission {
    fields: Map<String, Value>,
    files: Vec<(String, UploadedFile)>,
}

fn bad_body(reason: impl std::fmt::Display) -> ApiError {
    ApiError(EduError::invalid(format!("Invalid request body: {reason}")))
}

impl Submission {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            files: Vec::new(),
        }
    }

    /// Deserializes the text fields. Absent fields fall back to the target's
    /// serde defaults.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(bad_body)
    }

    /// First file uploaded under `name`.
    pub fn file(&self, name: &str) -> Option<UploadedFile> {
        self.files
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, file)| file.clone())
    }

    pub fn files(&self, name: &str) -> Vec<UploadedFile> {
        self.files
            .iter()
            .filter(|(field, _)| field == name)
            .map(|(_, file)| file.clone())
            .collect()
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut submission = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_body)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(bad_body)?;
                    submission
                        .files
                        .push((name, UploadedFile::new(file_name, content_type, bytes.to_vec())));
                }
                None => {
                    let text = field.text().await.map_err(bad_body)?;
                    submission.fields.insert(name, Value::String(text));
                }
            }
        }
        Ok(submission)
    }

    fn from_json(bytes: &[u8]) -> Result<Self, ApiError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        match serde_json::from_slice::<Value>(bytes).map_err(bad_body)? {
            Value::Object(fields) => Ok(Self::from_fields(fields)),
            Value::Null => Ok(Self::default()),
            _ => Err(bad_body("expected a JSON object")),
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| bad_body(e.body_text()))?;
            return Self::from_multipart(multipart).await;
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(form) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| bad_body(e.body_text()))?;
            let fields = form
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            return Ok(Self::from_fields(fields));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| bad_body(e.body_text()))?;
        Self::from_json(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use edu_models::SerieDraft;

    async fn extract(content_type: Option<&str>, body: impl Into<Body>) -> Result<Submission, ApiError> {
        let mut builder = axum::http::Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        Submission::from_request(builder.body(body.into()).unwrap(), &()).await
    }

    #[tokio::test]
    async fn json_and_empty_bodies() {
        let submission = extract(
            Some("application/json"),
            r#"{"serie_title":"Rust","isPublish":true}"#,
        )
        .await
        .unwrap();
        let draft: SerieDraft = submission.parse().unwrap();
        assert_eq!(draft.serie_title, "Rust");
        assert!(draft.is_publish);

        let empty = extract(None, "").await.unwrap();
        let draft: SerieDraft = empty.parse().unwrap();
        assert!(draft.serie_title.is_empty());

        assert!(extract(Some("application/json"), "[1,2]").await.is_err());
    }

    #[tokio::test]
    async fn urlencoded_form_fields_are_strings() {
        let submission = extract(
            Some("application/x-www-form-urlencoded"),
            "serie_title=Intro&isPublish=TRUE",
        )
        .await
        .unwrap();
        let draft: SerieDraft = submission.parse().unwrap();
        assert_eq!(draft.serie_title, "Intro");
        assert!(draft.is_publish);
    }

    #[tokio::test]
    async fn multipart_separates_files_from_fields() {
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"serie_title\"\r\n\r\n",
            "Uploads\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"serie_thumbnail\"; filename=\"cover.png\"\r\n",
            "Content-Type: image/png\r\n\r\n",
            "PNGDATA\r\n",
            "--XBOUNDARY--\r\n",
        );
        let submission = extract(Some("multipart/form-data; boundary=XBOUNDARY"), body)
            .await
            .unwrap();
        let draft: SerieDraft = submission.parse().unwrap();
        assert_eq!(draft.serie_title, "Uploads");

        let file = submission.file("serie_thumbnail").unwrap();
        assert_eq!(file.file_name, "cover.png");
        assert_eq!(file.content_type.as_deref(), Some("image/png"));
        assert_eq!(file.bytes, b"PNGDATA".to_vec());
        assert!(submission.file("lesson_video").is_none());
    }
}
