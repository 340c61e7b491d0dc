use axum::{
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use edu_control::CachedBody;
use serde::Serialize;
use std::sync::Arc;

/// `{success: true, data, message?}` used by the user endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn envelope<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        message: None,
    })
}

pub fn envelope_with<T: Serialize>(data: T, message: impl Into<String>) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        message: Some(message.into()),
    })
}

/// `{success, message, data?}` used by the tracking endpoints.
#[derive(Debug, Serialize)]
pub struct Ack<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ack<T: Serialize>(message: impl Into<String>, data: Option<T>) -> Json<Ack<T>> {
    Json(Ack {
        success: true,
        message: message.into(),
        data,
    })
}

/// Serves a cached JSON body, or 304 when the client already holds it.
pub fn cached_json(headers: &HeaderMap, cached: Arc<CachedBody>) -> Response {
    let etag = HeaderValue::from_str(&cached.etag).ok();
    let not_modified = headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| cached.matches(v))
        .unwrap_or(false);

    let mut response = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        (
            [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            cached.body.clone(),
        )
            .into_response()
    };

    let response_headers = response.headers_mut();
    if let Some(etag) = etag {
        response_headers.insert(ETAG, etag);
    }
    response_headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("private, max-age=300"),
    );
    response
}
