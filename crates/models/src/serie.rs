use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::EduError;

/// A course made of ordered lessons, owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Serie {
    #[serde(rename = "_id")]
    pub id: String,
    pub serie_title: String,
    pub serie_description: String,
    pub serie_thumbnail: String,
    #[serde(rename = "isPublish")]
    pub is_publish: bool,
    pub serie_user: String,
    pub serie_lessons: Vec<String>,
    pub serie_subscribe_num: i64,
    pub serie_sns: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct SerieDraft {
    #[serde(default)]
    pub serie_title: String,
    #[serde(default)]
    pub serie_description: String,
    #[serde(rename = "isPublish", default, deserialize_with = "deserialize_flag")]
    pub is_publish: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, ToSchema)]
pub struct SeriePatch {
    pub serie_title: Option<String>,
    pub serie_description: Option<String>,
    #[serde(
        rename = "isPublish",
        default,
        deserialize_with = "deserialize_optional_flag"
    )]
    pub is_publish: Option<bool>,
}

impl SerieDraft {
    pub fn validate(&self) -> Result<(), EduError> {
        if self.serie_title.trim().is_empty() {
            return Err(EduError::invalid("serie_title is required"));
        }
        Ok(())
    }
}

impl SeriePatch {
    pub fn validate(&self) -> Result<(), EduError> {
        if matches!(&self.serie_title, Some(title) if title.trim().is_empty()) {
            return Err(EduError::invalid("serie_title cannot be empty"));
        }
        Ok(())
    }
}

/// Publish flags arrive as JSON booleans or as form strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn truthy(self) -> bool {
        match self {
            Flag::Bool(value) => value,
            Flag::Text(text) => text.trim().eq_ignore_ascii_case("true"),
        }
    }
}

pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Flag>::deserialize(deserializer)?.map_or(false, Flag::truthy))
}

pub fn deserialize_optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Flag>::deserialize(deserializer)?.map(Flag::truthy))
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, ToSchema)]
pub struct SerieListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_optional_flag")]
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, ToSchema)]
pub struct SearchQuery {
    pub keyword: Option<String>,
}

/// Result of a subscribe call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SubscriptionOutcome {
    pub message: String,
    #[serde(rename = "alreadySubscribed", skip_serializing_if = "std::ops::Not::not", default)]
    pub already_subscribed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct UnsubscriptionOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "pendingConfirmation")]
    pub pending_confirmation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct AnnouncementRequest {
    pub title: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AnnouncementReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_ids: Option<Vec<String>>,
}
