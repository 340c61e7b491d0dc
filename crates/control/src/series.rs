use chrono::Utc;
use edu_models::{EduError, Serie, SerieDraft, SeriePatch};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use crate::store::{db_error, Store};

impl Store {
    async fn serie_from_row(&self, row: &SqliteRow) -> Result<Serie, EduError> {
        let id: String = row.try_get("id").map_err(db_error)?;
        let serie_lessons = self.lesson_ids(&id).await?;
        Ok(Serie {
            serie_title: row.try_get("title").map_err(db_error)?,
            serie_description: row.try_get("description").map_err(db_error)?,
            serie_thumbnail: row.try_get("thumbnail").map_err(db_error)?,
            is_publish: row.try_get("is_publish").map_err(db_error)?,
            serie_user: row.try_get("owner_id").map_err(db_error)?,
            serie_lessons,
            serie_subscribe_num: row.try_get("subscriber_count").map_err(db_error)?,
            serie_sns: row.try_get("topic_ref").map_err(db_error)?,
            created_at: row.try_get("created_at").map_err(db_error)?,
            updated_at: row.try_get("updated_at").map_err(db_error)?,
            id,
        })
    }

    async fn series_from_rows(&self, rows: Vec<SqliteRow>) -> Result<Vec<Serie>, EduError> {
        let mut series = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            series.push(self.serie_from_row(row).await?);
        }
        Ok(series)
    }

    async fn lesson_ids(&self, serie_id: &str) -> Result<Vec<String>, EduError> {
        let rows = sqlx::query("SELECT id FROM lessons WHERE serie_id = ? ORDER BY position")
            .bind(serie_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("id").map_err(db_error))
            .collect()
    }

    pub async fn insert_serie(
        &self,
        draft: &SerieDraft,
        owner: &str,
        thumbnail: &str,
    ) -> Result<Serie, EduError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO series (id, title, description, thumbnail, is_publish, owner_id, subscriber_count, topic_ref, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, NULL, ?, ?)",
        )
        .bind(&id)
        .bind(draft.serie_title.trim())
        .bind(&draft.serie_description)
        .bind(thumbnail)
        .bind(draft.is_publish)
        .bind(owner)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        debug!(serie_id = %id, "Inserted serie");
        self.require_serie(&id).await
    }

    pub async fn set_serie_topic(&self, serie_id: &str, topic: &str) -> Result<(), EduError> {
        sqlx::query("UPDATE series SET topic_ref = ? WHERE id = ?")
            .bind(topic)
            .bind(serie_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    pub async fn find_serie(&self, serie_id: &str) -> Result<Option<Serie>, EduError> {
        let row = sqlx::query("SELECT * FROM series WHERE id = ?")
            .bind(serie_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        match row {
            Some(row) => Ok(Some(self.serie_from_row(&row).await?)),
            None => Ok(None),
        }
    }

    /// Newest first. `page` starts at 1.
    pub async fn list_series(
        &self,
        page: u32,
        limit: u32,
        published: Option<bool>,
    ) -> Result<Vec<Serie>, EduError> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let rows = match published {
            Some(flag) => {
                sqlx::query(
                    "SELECT * FROM series WHERE is_publish = ? ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
                )
                .bind(flag)
                .bind(i64::from(limit))
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM series ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?")
                    .bind(i64::from(limit))
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(db_error)?;
        self.series_from_rows(rows).await
    }

    pub async fn series_by_owner(&self, owner: &str) -> Result<Vec<Serie>, EduError> {
        let rows = sqlx::query("SELECT * FROM series WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC")
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        self.series_from_rows(rows).await
    }

    /// Published series whose title contains `keyword`, ignoring case.
    pub async fn search_series(&self, keyword: &str) -> Result<Vec<Serie>, EduError> {
        let rows = sqlx::query(
            "SELECT * FROM series
             WHERE is_publish = 1 AND instr(lower(title), lower(?)) > 0
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(keyword)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        self.series_from_rows(rows).await
    }

    pub async fn series_subscribed_by(&self, user_id: &str) -> Result<Vec<Serie>, EduError> {
        let rows = sqlx::query(
            "SELECT s.* FROM series s
             JOIN subscriptions sub ON sub.serie_id = s.id
             WHERE sub.user_id = ?
             ORDER BY sub.created_at, sub.rowid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        self.series_from_rows(rows).await
    }

    /// `None` when the series does not exist.
    pub async fn update_serie(
        &self,
        serie_id: &str,
        patch: &SeriePatch,
        thumbnail: Option<&str>,
    ) -> Result<Option<Serie>, EduError> {
        let result = sqlx::query(
            "UPDATE series SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                is_publish = COALESCE(?, is_publish),
                thumbnail = COALESCE(?, thumbnail),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(patch.serie_title.as_deref().map(str::trim))
        .bind(&patch.serie_description)
        .bind(patch.is_publish)
        .bind(thumbnail)
        .bind(Utc::now())
        .bind(serie_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_serie(serie_id).await
    }

    /// Refuses while lessons remain. Removes the series from every user's
    /// subscriptions.
    pub async fn delete_serie(&self, serie_id: &str) -> Result<Serie, EduError> {
        let serie = self.require_serie(serie_id).await?;
        if !serie.serie_lessons.is_empty() {
            return Err(EduError::SerieHasLessons {
                serie_id: serie_id.to_string(),
            });
        }

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query("DELETE FROM subscriptions WHERE serie_id = ?")
            .bind(serie_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        sqlx::query("DELETE FROM series WHERE id = ?")
            .bind(serie_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        debug!(serie_id = %serie_id, "Deleted serie");
        Ok(serie)
    }

    /// Returns `false` when the user was already subscribed.
    pub async fn subscribe(&self, serie_id: &str, user_id: &str) -> Result<bool, EduError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let inserted = sqlx::query(
            "INSERT INTO subscriptions (user_id, serie_id, created_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id, serie_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(serie_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?
        .rows_affected();

        if inserted > 0 {
            sqlx::query(
                "UPDATE series SET subscriber_count = subscriber_count + 1, updated_at = ? WHERE id = ?",
            )
            .bind(now)
            .bind(serie_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
            sqlx::query("UPDATE users SET updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;
        Ok(inserted > 0)
    }

    /// Returns `false` when the user was not subscribed.
    pub async fn unsubscribe(&self, serie_id: &str, user_id: &str) -> Result<bool, EduError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let removed = sqlx::query("DELETE FROM subscriptions WHERE user_id = ? AND serie_id = ?")
            .bind(user_id)
            .bind(serie_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        if removed > 0 {
            sqlx::query(
                "UPDATE series SET subscriber_count = MAX(subscriber_count - 1, 0), updated_at = ? WHERE id = ?",
            )
            .bind(now)
            .bind(serie_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
            sqlx::query("UPDATE users SET updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;
        Ok(removed > 0)
    }

    pub(crate) async fn require_serie(&self, serie_id: &str) -> Result<Serie, EduError> {
        self.find_serie(serie_id)
            .await?
            .ok_or_else(|| EduError::SerieNotFound {
                serie_id: serie_id.to_string(),
            })
    }
}
