use edu_models::EduError;
use serde::Serialize;
use serde_json::Value;

/// Identity carried by a verified token.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentUser {
    pub user_id: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub groups: Vec<String>,
    pub token_use: Option<String>,
    pub client_id: Option<String>,
    #[serde(skip)]
    pub token: String,
}

fn text(claims: &Value, key: &str) -> Option<String> {
    claims
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl CurrentUser {
    pub fn from_claims(token: &str, claims: &Value) -> Result<Self, EduError> {
        let user_id = text(claims, "sub").ok_or_else(|| EduError::InvalidToken {
            reason: "token has no subject".to_string(),
        })?;

        let username = text(claims, "preferred_username")
            .or_else(|| text(claims, "cognito:username"))
            .or_else(|| text(claims, "username"));

        let groups = claims
            .get("cognito:groups")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            user_id,
            email: text(claims, "email"),
            email_verified: claims.get("email_verified").and_then(Value::as_bool),
            username,
            name: text(claims, "name"),
            groups,
            token_use: text(claims, "token_use"),
            client_id: text(claims, "client_id"),
            token: token.to_string(),
        })
    }

    pub fn is_in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}
