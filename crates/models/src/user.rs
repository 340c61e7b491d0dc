use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Instructor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
        }
    }

    /// Unknown values fall back to `Student`.
    pub fn parse(value: &str) -> Self {
        match value {
            "instructor" => Role::Instructor,
            _ => Role::Student,
        }
    }
}

/// Learner or instructor profile, keyed by the identity provider subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: Role,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub avatar: Option<String>,
    pub serie_subscribe: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct CreateUserRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub avatar: Option<String>,
}

/// Mutable profile fields. Identity fields in the body are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct SyncUserRequest {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub avatar: Option<String>,
}

impl CreateUserRequest {
    pub fn profile_fields(&self) -> UpdateUserRequest {
        UpdateUserRequest {
            name: self.name.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            gender: self.gender.clone(),
            birthdate: self.birthdate.clone(),
            avatar: self.avatar.clone(),
        }
    }
}
