use anyhow::Result;
use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use edu_api::{build_app, AppState};
use edu_auth::Authenticator;
use edu_control::Platform;
use edu_metrics::MetricsService;
use edu_models::Config;
use edu_notify::LocalNotifier;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use crate::fakes::{FakeMediaStore, RecordingMailer};
use crate::tokens::test_jwk_set;
use crate::{test_config, TestPlatform};

const BOUNDARY: &str = "edu-test-boundary";

/// The whole HTTP application wired to in-memory collaborators. Requests are
/// driven through the router without opening a socket.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub media: Arc<FakeMediaStore>,
    pub notifier: Arc<LocalNotifier>,
    pub mailer: Arc<RecordingMailer>,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A file part of a multipart request.
pub struct FilePart<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

pub fn multipart_body(fields: &[(&str, &str)], files: &[FilePart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for file in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.field, file.file_name, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Result<Self> {
        let (state, harness) = Self::state(config).await?;
        Ok(Self {
            router: build_app(state.clone()),
            state,
            media: harness.media,
            notifier: harness.notifier,
            mailer: harness.mailer,
        })
    }

    /// Application state with fakes behind every external collaborator.
    pub async fn state(config: Config) -> Result<(AppState, TestPlatform)> {
        let harness = TestPlatform::with_config(&config).await?;

        let auth = Authenticator::from_config(&config.auth);
        if let Some(jwks) = auth.jwks() {
            jwks.preload(test_jwk_set().keys).await;
        }

        let state = AppState::new(
            config,
            harness.platform.clone(),
            Arc::new(auth),
            Arc::new(MetricsService::new()?),
        );
        Ok((state, harness))
    }

    pub fn platform(&self) -> &Platform {
        &self.state.platform
    }

    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body can be read");
        TestResponse {
            status,
            headers,
            body,
        }
    }

    fn builder(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        match token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let request = Self::builder(Method::GET, uri, token)
            .body(Body::empty())
            .expect("valid request");
        self.request(request).await
    }

    /// GET with `If-None-Match`.
    pub async fn get_if_none_match(&self, uri: &str, token: &str, etag: &str) -> TestResponse {
        let request = Self::builder(Method::GET, uri, Some(token))
            .header(header::IF_NONE_MATCH, etag)
            .body(Body::empty())
            .expect("valid request");
        self.request(request).await
    }

    pub async fn send_json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> TestResponse {
        let request = Self::builder(method, uri, token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("valid request");
        self.request(request).await
    }

    pub async fn send_empty(&self, method: Method, uri: &str, token: Option<&str>) -> TestResponse {
        let request = Self::builder(method, uri, token)
            .body(Body::empty())
            .expect("valid request");
        self.request(request).await
    }

    pub async fn send_multipart(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        fields: &[(&str, &str)],
        files: &[FilePart<'_>],
    ) -> TestResponse {
        let request = Self::builder(method, uri, token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(fields, files)))
            .expect("valid request");
        self.request(request).await
    }
}
