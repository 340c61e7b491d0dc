use chrono::Utc;
use edu_models::{EduError, Role, UpdateUserRequest, User};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use crate::store::{db_error, Store};

/// Outcome of an administrative role change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    NotFound,
    Unchanged,
    Updated,
}

fn user_from_row(row: &SqliteRow, serie_subscribe: Vec<String>) -> Result<User, EduError> {
    let id: String = row.try_get("id").map_err(db_error)?;
    let role: String = row.try_get("role").map_err(db_error)?;
    Ok(User {
        user_id: id.clone(),
        id,
        name: row.try_get("name").map_err(db_error)?,
        email: row.try_get("email").map_err(db_error)?,
        username: row.try_get("username").map_err(db_error)?,
        role: Role::parse(&role),
        gender: row.try_get("gender").map_err(db_error)?,
        birthdate: row.try_get("birthdate").map_err(db_error)?,
        avatar: row.try_get("avatar").map_err(db_error)?,
        serie_subscribe,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

impl Store {
    pub async fn find_user(&self, user_id: &str) -> Result<Option<User>, EduError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        match row {
            Some(row) => {
                let subs = self.subscriptions_of(user_id).await?;
                Ok(Some(user_from_row(&row, subs)?))
            }
            None => Ok(None),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, EduError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ? LIMIT 1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        match row {
            Some(row) => {
                let id: String = row.try_get("id").map_err(db_error)?;
                let subs = self.subscriptions_of(&id).await?;
                Ok(Some(user_from_row(&row, subs)?))
            }
            None => Ok(None),
        }
    }

    /// Inserts a fresh student profile. Fails if the id is taken.
    pub async fn insert_user(
        &self,
        user_id: &str,
        fields: &UpdateUserRequest,
    ) -> Result<User, EduError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (id, name, email, username, role, gender, birthdate, avatar, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(user_id)
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.username)
        .bind(Role::Student.as_str())
        .bind(&fields.gender)
        .bind(&fields.birthdate)
        .bind(&fields.avatar)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(EduError::UserAlreadyExists {
                user_id: user_id.to_string(),
            });
        }
        debug!(user_id = %user_id, "Inserted user profile");
        self.require_user(user_id).await
    }

    /// Existing id means update, otherwise insert.
    pub async fn create_or_update_user(
        &self,
        user_id: &str,
        fields: &UpdateUserRequest,
    ) -> Result<User, EduError> {
        match self.find_user(user_id).await? {
            Some(_) => self.update_user(user_id, fields).await,
            None => self.insert_user(user_id, fields).await,
        }
    }

    /// Upsert: absent fields keep their stored value, `updated_at` is refreshed.
    pub async fn update_user(
        &self,
        user_id: &str,
        fields: &UpdateUserRequest,
    ) -> Result<User, EduError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (id, name, email, username, role, gender, birthdate, avatar, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'student', ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = COALESCE(excluded.name, users.name),
                email = COALESCE(excluded.email, users.email),
                username = COALESCE(excluded.username, users.username),
                gender = COALESCE(excluded.gender, users.gender),
                birthdate = COALESCE(excluded.birthdate, users.birthdate),
                avatar = COALESCE(excluded.avatar, users.avatar),
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(&fields.name)
        .bind(&fields.email)
        .bind(&fields.username)
        .bind(&fields.gender)
        .bind(&fields.birthdate)
        .bind(&fields.avatar)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.require_user(user_id).await
    }

    pub async fn set_role_by_email(&self, email: &str, role: Role) -> Result<RoleChange, EduError> {
        let Some(user) = self.find_user_by_email(email).await? else {
            return Ok(RoleChange::NotFound);
        };
        if user.role == role {
            return Ok(RoleChange::Unchanged);
        }
        sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE email = ?")
            .bind(role.as_str())
            .bind(Utc::now())
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(RoleChange::Updated)
    }

    /// Addresses of everyone subscribed to the series that has one on file.
    pub async fn subscriber_emails(&self, serie_id: &str) -> Result<Vec<String>, EduError> {
        let rows = sqlx::query(
            "SELECT u.email FROM subscriptions s
             JOIN users u ON u.id = s.user_id
             WHERE s.serie_id = ? AND u.email IS NOT NULL AND u.email != ''
             ORDER BY s.created_at",
        )
        .bind(serie_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("email").map_err(db_error))
            .collect()
    }

    pub async fn subscriptions_of(&self, user_id: &str) -> Result<Vec<String>, EduError> {
        let rows = sqlx::query(
            "SELECT serie_id FROM subscriptions WHERE user_id = ? ORDER BY created_at, rowid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("serie_id").map_err(db_error))
            .collect()
    }

    async fn require_user(&self, user_id: &str) -> Result<User, EduError> {
        self.find_user(user_id)
            .await?
            .ok_or_else(|| EduError::UserNotFound {
                user_id: user_id.to_string(),
            })
    }
}
