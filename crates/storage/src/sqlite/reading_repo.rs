use async_trait::async_trait;
use reading_core::model::{Chapter, ChapterKey, HistoryId, NewHistoryRecord, UserId};

use super::SqliteRepository;
use super::mapping::{chapters_to_json, conn, history_id_from_i64, id_i64, map_subject_row};
use crate::repository::{CommittedReading, MAX_COMMIT_ATTEMPTS, ReadingPersistence, StorageError};

/// Why a single commit attempt did not go through.
enum AttemptError {
    /// Lost a race on the subject row; safe to run the attempt again.
    Contended,
    Failed(StorageError),
}

impl From<StorageError> for AttemptError {
    fn from(err: StorageError) -> Self {
        Self::Failed(err)
    }
}

impl From<sqlx::Error> for AttemptError {
    fn from(err: sqlx::Error) -> Self {
        if is_busy(&err) {
            Self::Contended
        } else {
            Self::Failed(conn(err))
        }
    }
}

// SQLITE_BUSY and SQLITE_BUSY_SNAPSHOT.
fn is_busy(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "5" || code == "517")
}

impl SqliteRepository {
    async fn commit_attempt(
        &self,
        user: &UserId,
        record: &NewHistoryRecord,
        chapter: &ChapterKey,
    ) -> Result<CommittedReading, AttemptError> {
        let subject_id = id_i64("subject_id", record.subject_id.value())?;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r"
            SELECT id, name, chapters, version, created_at
            FROM subjects WHERE user_id = ?1 AND id = ?2
            ",
        )
        .bind(user.as_str())
        .bind(subject_id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut current = row.as_ref().map(map_subject_row).transpose()?;
        let updated: Option<Chapter> = current.as_mut().and_then(|(subject, _)| {
            subject
                .apply_reading(chapter, record.duration_minutes)
                .cloned()
        });
        let record = record.clone().with_resolved_chapter(updated.as_ref());
        let chapter_id = record
            .chapter_id
            .map(|id| id_i64("chapter_id", id.value()))
            .transpose()?;

        let res = sqlx::query(
            r"
                INSERT INTO history (
                    user_id, subject_id, subject_name, chapter_id, chapter_name,
                    duration_minutes, recorded_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(user.as_str())
        .bind(subject_id)
        .bind(record.subject_name.as_str())
        .bind(chapter_id)
        .bind(record.chapter_name.as_str())
        .bind(record.duration_minutes)
        .bind(record.recorded_at)
        .execute(&mut *tx)
        .await?;
        let history_id: HistoryId = history_id_from_i64(res.last_insert_rowid())?;

        let subject_found = current.is_some();
        if let Some((subject, version)) = current {
            let res = sqlx::query(
                r"
                UPDATE subjects
                SET chapters = ?1, version = version + 1
                WHERE user_id = ?2 AND id = ?3 AND version = ?4
                ",
            )
            .bind(chapters_to_json(subject.chapters())?)
            .bind(user.as_str())
            .bind(subject_id)
            .bind(version)
            .execute(&mut *tx)
            .await?;

            if res.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(AttemptError::Contended);
            }
        }

        tx.commit().await?;

        Ok(CommittedReading {
            history_id,
            chapter: updated,
            subject_found,
        })
    }
}

#[async_trait]
impl ReadingPersistence for SqliteRepository {
    async fn commit_reading(
        &self,
        user: &UserId,
        record: NewHistoryRecord,
        chapter: &ChapterKey,
    ) -> Result<CommittedReading, StorageError> {
        if &record.user_id != user {
            return Err(StorageError::Conflict);
        }

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            match self.commit_attempt(user, &record, chapter).await {
                Ok(committed) => return Ok(committed),
                Err(AttemptError::Contended) => {}
                Err(AttemptError::Failed(err)) => return Err(err),
            }
        }
        Err(StorageError::Conflict)
    }
}
