use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::EduError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: String,
    pub lesson_title: String,
    pub lesson_content: String,
    pub lesson_video: String,
    pub lesson_documents: Vec<String>,
    pub lesson_serie: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct LessonDraft {
    #[serde(default)]
    pub lesson_title: String,
    #[serde(default)]
    pub lesson_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, ToSchema)]
pub struct LessonPatch {
    pub lesson_title: Option<String>,
    pub lesson_content: Option<String>,
}

impl LessonDraft {
    pub fn validate(&self) -> Result<(), EduError> {
        if self.lesson_title.trim().is_empty() {
            return Err(EduError::invalid("lesson_title is required"));
        }
        Ok(())
    }
}

impl LessonPatch {
    pub fn validate(&self) -> Result<(), EduError> {
        if matches!(&self.lesson_title, Some(title) if title.trim().is_empty()) {
            return Err(EduError::invalid("lesson_title cannot be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct DeleteDocumentRequest {
    #[serde(rename = "docUrl")]
    pub doc_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_requires_title() {
        let draft: LessonDraft = serde_json::from_str(r#"{"lesson_content": "body"}"#).unwrap();
        assert!(draft.validate().is_err());

        let draft: LessonDraft = serde_json::from_str(r#"{"lesson_title": "Intro"}"#).unwrap();
        assert!(draft.validate().is_ok());
        assert_eq!(draft.lesson_content, "");
    }

    #[test]
    fn doc_url_wire_name() {
        let req: DeleteDocumentRequest =
            serde_json::from_str(r#"{"docUrl": "https://cdn/x.pdf"}"#).unwrap();
        assert_eq!(req.doc_url.as_deref(), Some("https://cdn/x.pdf"));
    }
}
