use chrono::{DateTime, Utc};
use edu_models::{ActiveLesson, EduError, ExitOutcome, LessonVisit};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::store::{db_error, Store};

fn tab_from_row(row: &SqliteRow) -> Result<ActiveLesson, EduError> {
    Ok(ActiveLesson {
        lesson_id: row.try_get("lesson_id").map_err(db_error)?,
        serie_id: row.try_get("serie_id").map_err(db_error)?,
        lesson_title: row.try_get("lesson_title").map_err(db_error)?,
        tab_id: row.try_get("tab_id").map_err(db_error)?,
        last_active: row.try_get("last_active").map_err(db_error)?,
    })
}

/// Open tabs of one user, oldest first; the last one is the current lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSnapshot {
    pub tabs: Vec<ActiveLesson>,
    pub last_updated: DateTime<Utc>,
}

impl TrackingSnapshot {
    pub fn current(&self) -> Option<&ActiveLesson> {
        self.tabs.last()
    }
}

impl Store {
    /// Drops the user's tabs idle since before `stale_before`, then records
    /// `visit` as the focused tab.
    pub async fn enter_lesson(
        &self,
        visit: &LessonVisit,
        stale_before: DateTime<Utc>,
    ) -> Result<ActiveLesson, EduError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("DELETE FROM lesson_tabs WHERE user_id = ? AND last_active < ?")
            .bind(&visit.user_id)
            .bind(stale_before)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        sqlx::query(
            "INSERT INTO lesson_tabs (user_id, tab_id, lesson_id, serie_id, lesson_title, last_active)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, tab_id) DO UPDATE SET
                lesson_id = excluded.lesson_id,
                serie_id = excluded.serie_id,
                lesson_title = excluded.lesson_title,
                last_active = excluded.last_active",
        )
        .bind(&visit.user_id)
        .bind(&visit.tab_id)
        .bind(&visit.lesson_id)
        .bind(&visit.serie_id)
        .bind(&visit.lesson_title)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        touch_session(&mut tx, &visit.user_id, now).await?;
        tx.commit().await.map_err(db_error)?;

        Ok(ActiveLesson {
            lesson_id: visit.lesson_id.clone(),
            serie_id: visit.serie_id.clone(),
            lesson_title: visit.lesson_title.clone(),
            tab_id: visit.tab_id.clone(),
            last_active: now,
        })
    }

    pub async fn exit_lesson(&self, user_id: &str, tab_id: &str) -> Result<ExitOutcome, EduError> {
        if self.tracking_snapshot(user_id).await?.is_none() {
            return Ok(ExitOutcome::NoTracking);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query("DELETE FROM lesson_tabs WHERE user_id = ? AND tab_id = ?")
            .bind(user_id)
            .bind(tab_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let (remaining,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM lesson_tabs WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error)?;

        let outcome = if remaining == 0 {
            sqlx::query("DELETE FROM tracking_sessions WHERE user_id = ?")
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
            ExitOutcome::AllCleared
        } else {
            touch_session(&mut tx, user_id, now).await?;
            ExitOutcome::Remaining(remaining as usize)
        };
        tx.commit().await.map_err(db_error)?;
        Ok(outcome)
    }

    pub async fn focus_lesson(&self, user_id: &str, tab_id: &str) -> Result<ActiveLesson, EduError> {
        if self.tracking_snapshot(user_id).await?.is_none() {
            return Err(EduError::TrackingNotFound {
                reason: "No tracking data found for user".to_string(),
            });
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let updated = sqlx::query(
            "UPDATE lesson_tabs SET last_active = ? WHERE user_id = ? AND tab_id = ?",
        )
        .bind(now)
        .bind(user_id)
        .bind(tab_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?
        .rows_affected();

        if updated == 0 {
            return Err(EduError::TrackingNotFound {
                reason: "Tab not found in active lessons".to_string(),
            });
        }
        touch_session(&mut tx, user_id, now).await?;

        let row = sqlx::query("SELECT * FROM lesson_tabs WHERE user_id = ? AND tab_id = ?")
            .bind(user_id)
            .bind(tab_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error)?;
        let focused = tab_from_row(&row)?;
        tx.commit().await.map_err(db_error)?;
        Ok(focused)
    }

    pub async fn tracking_snapshot(
        &self,
        user_id: &str,
    ) -> Result<Option<TrackingSnapshot>, EduError> {
        let session = sqlx::query("SELECT last_updated FROM tracking_sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        let Some(session) = session else {
            return Ok(None);
        };
        let last_updated: DateTime<Utc> = session.try_get("last_updated").map_err(db_error)?;

        let rows = sqlx::query("SELECT * FROM lesson_tabs WHERE user_id = ? ORDER BY rowid")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        let mut tabs = rows
            .iter()
            .map(tab_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        if tabs.is_empty() {
            return Ok(None);
        }
        tabs.sort_by_key(|t| t.last_active);

        Ok(Some(TrackingSnapshot { tabs, last_updated }))
    }

    /// Removes every tab idle since before `stale_before` and the sessions
    /// left without tabs. Returns the number of tabs removed.
    pub async fn purge_stale_tabs(&self, stale_before: DateTime<Utc>) -> Result<u64, EduError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let removed = sqlx::query("DELETE FROM lesson_tabs WHERE last_active < ?")
            .bind(stale_before)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();
        sqlx::query(
            "DELETE FROM tracking_sessions
             WHERE user_id NOT IN (SELECT DISTINCT user_id FROM lesson_tabs)",
        )
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok(removed)
    }
}

async fn touch_session(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<(), EduError> {
    sqlx::query(
        "INSERT INTO tracking_sessions (user_id, last_updated) VALUES (?, ?)
         ON CONFLICT(user_id) DO UPDATE SET last_updated = excluded.last_updated",
    )
    .bind(user_id)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(db_error)?;
    Ok(())
}
