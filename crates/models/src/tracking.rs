use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::{EduError, Lesson};

/// One browser tab showing a lesson.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ActiveLesson {
    pub lesson_id: String,
    pub serie_id: String,
    pub lesson_title: Option<String>,
    pub tab_id: String,
    pub last_active: DateTime<Utc>,
}

/// Front ends send ids as strings or bare numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Identifier {
    Text(String),
    Number(serde_json::Number),
}

fn deserialize_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Identifier>::deserialize(deserializer)?.map(|id| match id {
        Identifier::Text(text) => text,
        Identifier::Number(number) => number.to_string(),
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct EnterLessonRequest {
    #[serde(default, deserialize_with = "deserialize_identifier")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_identifier")]
    pub lesson_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_identifier")]
    pub serie_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_identifier")]
    pub tab_id: Option<String>,
    pub lesson_title: Option<String>,
}

/// Body of the exit and focus calls.
#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct TabRequest {
    #[serde(default, deserialize_with = "deserialize_identifier")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_identifier")]
    pub tab_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LessonVisit {
    pub user_id: String,
    pub lesson_id: String,
    pub serie_id: String,
    pub tab_id: String,
    pub lesson_title: Option<String>,
}

fn required(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn missing_fields() -> EduError {
    EduError::invalid("Missing required fields")
}

impl EnterLessonRequest {
    pub fn into_visit(self) -> Result<LessonVisit, EduError> {
        Ok(LessonVisit {
            user_id: required(&self.user_id).ok_or_else(missing_fields)?,
            lesson_id: required(&self.lesson_id).ok_or_else(missing_fields)?,
            serie_id: required(&self.serie_id).ok_or_else(missing_fields)?,
            tab_id: required(&self.tab_id).ok_or_else(missing_fields)?,
            lesson_title: self.lesson_title,
        })
    }
}

impl TabRequest {
    pub fn into_parts(self) -> Result<(String, String), EduError> {
        let user_id = required(&self.user_id).ok_or_else(missing_fields)?;
        let tab_id = required(&self.tab_id).ok_or_else(missing_fields)?;
        Ok((user_id, tab_id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TrackingAck {
    pub user_id: String,
    pub lesson_id: String,
    pub serie_id: String,
    pub lesson_title: Option<String>,
    pub tab_id: String,
}

/// Result of closing a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    NoTracking,
    AllCleared,
    Remaining(usize),
}

impl ExitOutcome {
    pub fn message(&self) -> String {
        match self {
            ExitOutcome::NoTracking => "No tracking data found".to_string(),
            ExitOutcome::AllCleared => "All lessons cleared".to_string(),
            ExitOutcome::Remaining(n) => format!("Lesson cleared, {n} tabs remaining"),
        }
    }
}

/// What a user is looking at right now, with the lesson itself when it still exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct CurrentLesson {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serie_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    pub is_in_lesson: bool,
    pub active_lessons: Vec<ActiveLesson>,
    pub total_active_tabs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_data: Option<Lesson>,
}

impl CurrentLesson {
    pub fn idle(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            lesson_id: None,
            serie_id: None,
            lesson_title: None,
            last_updated: None,
            is_in_lesson: false,
            active_lessons: Vec::new(),
            total_active_tabs: 0,
            lesson_data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enter_requires_all_identifiers() {
        let req = EnterLessonRequest {
            user_id: Some("u1".into()),
            lesson_id: Some("l1".into()),
            serie_id: Some("s1".into()),
            tab_id: Some("  ".into()),
            lesson_title: None,
        };
        let err = req.into_visit().unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields");
    }

    #[test]
    fn numeric_identifiers_are_read_as_text() {
        let req: EnterLessonRequest = serde_json::from_value(json!({
            "user_id": 42,
            "lesson_id": 7,
            "serie_id": "s1",
            "tab_id": 3
        }))
        .unwrap();
        let visit = req.into_visit().unwrap();
        assert_eq!(visit.user_id, "42");
        assert_eq!(visit.lesson_id, "7");
        assert_eq!(visit.serie_id, "s1");
        assert_eq!(visit.tab_id, "3");

        let tab: TabRequest = serde_json::from_value(json!({"user_id": 42, "tab_id": 1.5})).unwrap();
        assert_eq!(tab.into_parts().unwrap(), ("42".to_string(), "1.5".to_string()));
    }

    #[test]
    fn absent_or_null_identifiers_are_missing() {
        let tab: TabRequest = serde_json::from_value(json!({"user_id": null})).unwrap();
        assert_eq!(tab.into_parts().unwrap_err().to_string(), "Missing required fields");
    }

    #[test]
    fn non_scalar_identifiers_are_rejected() {
        let err = serde_json::from_value::<TabRequest>(json!({"user_id": true, "tab_id": "t1"}));
        assert!(err.is_err());
    }

    #[test]
    fn idle_view_shape() {
        let json = serde_json::to_value(CurrentLesson::idle("u1")).unwrap();
        assert_eq!(
            json,
            json!({
                "user_id": "u1",
                "is_in_lesson": false,
                "active_lessons": [],
                "total_active_tabs": 0
            })
        );
    }

    #[test]
    fn exit_messages() {
        assert_eq!(ExitOutcome::AllCleared.message(), "All lessons cleared");
        assert_eq!(
            ExitOutcome::Remaining(2).message(),
            "Lesson cleared, 2 tabs remaining"
        );
    }
}
