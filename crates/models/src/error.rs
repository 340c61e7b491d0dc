use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorShape {
    pub success: bool,
    pub message: String,
    /// Machine-readable code; present on authentication failures only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Error, Debug)]
pub enum EduError {
    #[error("No authentication token provided")]
    MissingToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token audience mismatch")]
    InvalidAudience,

    #[error("Token issuer mismatch")]
    InvalidIssuer,

    #[error("Invalid authentication token")]
    InvalidToken { reason: String },

    /// Undecodable token while signature checks are disabled.
    #[error("{reason}")]
    MalformedToken { reason: String },

    #[error("JWT verification not configured. Set COGNITO_USER_POOL_ID and AWS_REGION")]
    AuthNotConfigured,

    #[error("{reason}")]
    Forbidden { reason: String },

    #[error("User not found")]
    UserNotFound { user_id: String },

    #[error("User profile already exists")]
    UserAlreadyExists { user_id: String },

    #[error("Serie not found")]
    SerieNotFound { serie_id: String },

    #[error("Lesson not found")]
    LessonNotFound { lesson_id: String },

    #[error("Document not found in lesson")]
    DocumentNotFound { url: String },

    #[error("Cannot delete a series that still has lessons")]
    SerieHasLessons { serie_id: String },

    #[error("{reason}")]
    TrackingNotFound { reason: String },

    #[error("{reason}")]
    InvalidRequest { reason: String },

    #[error("Mail delivery failed: {reason}")]
    MailerError { reason: String },

    #[error("Internal server error: {reason}")]
    InternalError { reason: String },

    #[error("Database error: {reason}")]
    DatabaseError { reason: String },

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },
}

impl EduError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        EduError::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        EduError::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        EduError::InternalError {
            reason: reason.into(),
        }
    }

    pub fn to_error_shape(&self) -> ErrorShape {
        ErrorShape {
            success: false,
            message: self.to_string(),
            error: self.is_auth_error().then(|| self.error_type().to_string()),
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            EduError::MissingToken
                | EduError::TokenExpired
                | EduError::InvalidAudience
                | EduError::InvalidIssuer
                | EduError::InvalidToken { .. }
                | EduError::MalformedToken { .. }
                | EduError::AuthNotConfigured
        )
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            EduError::MissingToken => "unauthorized",
            EduError::TokenExpired => "token_expired",
            EduError::InvalidAudience => "invalid_audience",
            EduError::InvalidIssuer => "invalid_issuer",
            EduError::InvalidToken { .. } => "invalid_token",
            EduError::MalformedToken { .. } => "invalid_token",
            EduError::AuthNotConfigured => "configuration_error",
            EduError::Forbidden { .. } => "forbidden",
            EduError::UserNotFound { .. } => "not_found",
            EduError::UserAlreadyExists { .. } => "conflict",
            EduError::SerieNotFound { .. } => "not_found",
            EduError::LessonNotFound { .. } => "not_found",
            EduError::DocumentNotFound { .. } => "bad_request",
            EduError::SerieHasLessons { .. } => "bad_request",
            EduError::TrackingNotFound { .. } => "not_found",
            EduError::InvalidRequest { .. } => "bad_request",
            EduError::MailerError { .. } => "internal_error",
            EduError::InternalError { .. } => "internal_error",
            EduError::DatabaseError { .. } => "internal_error",
            EduError::SqlxError(_) => "internal_error",
            EduError::ConfigError { .. } => "configuration_error",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            EduError::MissingToken => 401,
            EduError::TokenExpired => 403,
            EduError::InvalidAudience => 401,
            EduError::InvalidIssuer => 401,
            EduError::InvalidToken { .. } => 403,
            EduError::MalformedToken { .. } => 401,
            EduError::AuthNotConfigured => 500,
            EduError::Forbidden { .. } => 403,
            EduError::UserNotFound { .. } => 404,
            EduError::UserAlreadyExists { .. } => 409,
            EduError::SerieNotFound { .. } => 404,
            EduError::LessonNotFound { .. } => 404,
            EduError::DocumentNotFound { .. } => 400,
            EduError::SerieHasLessons { .. } => 400,
            EduError::TrackingNotFound { .. } => 404,
            EduError::InvalidRequest { .. } => 400,
            EduError::MailerError { .. } => 500,
            EduError::InternalError { .. } => 500,
            EduError::DatabaseError { .. } => 500,
            EduError::SqlxError(_) => 500,
            EduError::ConfigError { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_carry_a_code() {
        let shape = EduError::TokenExpired.to_error_shape();
        assert!(!shape.success);
        assert_eq!(shape.message, "Token has expired");
        assert_eq!(shape.error.as_deref(), Some("token_expired"));
        assert_eq!(EduError::TokenExpired.http_status(), 403);
        assert_eq!(EduError::InvalidAudience.http_status(), 401);
    }

    #[test]
    fn resource_errors_have_no_code() {
        let err = EduError::SerieNotFound {
            serie_id: "s1".into(),
        };
        let json = serde_json::to_value(err.to_error_shape()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "message": "Serie not found"})
        );
        assert_eq!(err.http_status(), 404);
    }
}
