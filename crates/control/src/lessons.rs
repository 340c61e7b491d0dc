use chrono::Utc;
use edu_models::{EduError, Lesson, LessonDraft, LessonPatch};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use crate::store::{db_error, Store};

fn lesson_from_row(row: &SqliteRow) -> Result<Lesson, EduError> {
    let documents: String = row.try_get("documents").map_err(db_error)?;
    let lesson_documents: Vec<String> =
        serde_json::from_str(&documents).map_err(|e| EduError::DatabaseError {
            reason: format!("corrupt lesson documents: {e}"),
        })?;
    Ok(Lesson {
        id: row.try_get("id").map_err(db_error)?,
        lesson_title: row.try_get("title").map_err(db_error)?,
        lesson_content: row.try_get("content").map_err(db_error)?,
        lesson_video: row.try_get("video").map_err(db_error)?,
        lesson_documents,
        lesson_serie: row.try_get("serie_id").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn encode_documents(documents: &[String]) -> Result<String, EduError> {
    serde_json::to_string(documents).map_err(|e| EduError::InternalError {
        reason: e.to_string(),
    })
}

fn lesson_not_found(lesson_id: &str) -> EduError {
    EduError::LessonNotFound {
        lesson_id: lesson_id.to_string(),
    }
}

impl Store {
    /// Appends the lesson at the end of its series.
    pub async fn insert_lesson(
        &self,
        serie_id: &str,
        draft: &LessonDraft,
        video: &str,
        documents: &[String],
    ) -> Result<Lesson, EduError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let documents = encode_documents(documents)?;

        sqlx::query(
            "INSERT INTO lessons (id, serie_id, position, title, content, video, documents, created_at, updated_at)
             VALUES (?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM lessons WHERE serie_id = ?), ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(serie_id)
        .bind(serie_id)
        .bind(draft.lesson_title.trim())
        .bind(&draft.lesson_content)
        .bind(video)
        .bind(&documents)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        debug!(serie_id = %serie_id, lesson_id = %id, "Inserted lesson");
        self.find_lesson(serie_id, &id)
            .await?
            .ok_or_else(|| lesson_not_found(&id))
    }

    /// Only finds the lesson inside the given series.
    pub async fn find_lesson(
        &self,
        serie_id: &str,
        lesson_id: &str,
    ) -> Result<Option<Lesson>, EduError> {
        let row = sqlx::query("SELECT * FROM lessons WHERE id = ? AND serie_id = ?")
            .bind(lesson_id)
            .bind(serie_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(lesson_from_row).transpose()
    }

    pub async fn lessons_by_serie(&self, serie_id: &str) -> Result<Vec<Lesson>, EduError> {
        let rows = sqlx::query("SELECT * FROM lessons WHERE serie_id = ? ORDER BY position")
            .bind(serie_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.iter().map(lesson_from_row).collect()
    }

    /// `None` when the lesson does not exist in the series.
    pub async fn update_lesson(
        &self,
        serie_id: &str,
        lesson_id: &str,
        patch: &LessonPatch,
        video: Option<&str>,
        documents: Option<&[String]>,
    ) -> Result<Option<Lesson>, EduError> {
        let documents = documents.map(encode_documents).transpose()?;
        let result = sqlx::query(
            "UPDATE lessons SET
                title = COALESCE(?, title),
                content = COALESCE(?, content),
                video = COALESCE(?, video),
                documents = COALESCE(?, documents),
                updated_at = ?
             WHERE id = ? AND serie_id = ?",
        )
        .bind(patch.lesson_title.as_deref().map(str::trim))
        .bind(&patch.lesson_content)
        .bind(video)
        .bind(documents)
        .bind(Utc::now())
        .bind(lesson_id)
        .bind(serie_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_lesson(serie_id, lesson_id).await
    }

    /// Removes the lesson (and with it its place in the series order) and
    /// returns what was stored so media can be cleaned up.
    pub async fn delete_lesson(&self, serie_id: &str, lesson_id: &str) -> Result<Lesson, EduError> {
        let lesson = self
            .find_lesson(serie_id, lesson_id)
            .await?
            .ok_or_else(|| lesson_not_found(lesson_id))?;

        sqlx::query("DELETE FROM lessons WHERE id = ? AND serie_id = ?")
            .bind(lesson_id)
            .bind(serie_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        debug!(serie_id = %serie_id, lesson_id = %lesson_id, "Deleted lesson");
        Ok(lesson)
    }

    pub async fn remove_document(
        &self,
        serie_id: &str,
        lesson_id: &str,
        url: &str,
    ) -> Result<Lesson, EduError> {
        let lesson = self
            .find_lesson(serie_id, lesson_id)
            .await?
            .ok_or_else(|| lesson_not_found(lesson_id))?;

        if !lesson.lesson_documents.iter().any(|d| d == url) {
            return Err(EduError::DocumentNotFound {
                url: url.to_string(),
            });
        }
        let remaining: Vec<String> = lesson
            .lesson_documents
            .into_iter()
            .filter(|d| d != url)
            .collect();

        sqlx::query("UPDATE lessons SET documents = ?, updated_at = ? WHERE id = ? AND serie_id = ?")
            .bind(encode_documents(&remaining)?)
            .bind(Utc::now())
            .bind(lesson_id)
            .bind(serie_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        self.find_lesson(serie_id, lesson_id)
            .await?
            .ok_or_else(|| lesson_not_found(lesson_id))
    }
}
