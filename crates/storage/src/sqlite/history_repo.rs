use async_trait::async_trait;
use reading_core::model::{HistoryRecord, UserId};

use super::SqliteRepository;
use super::mapping::{conn, map_history_row};
use crate::repository::{HistoryRepository, StorageError};

#[async_trait]
impl HistoryRepository for SqliteRepository {
    async fn list_history(&self, user: &UserId) -> Result<Vec<HistoryRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, user_id, subject_id, subject_name, chapter_id, chapter_name,
                    duration_minutes, recorded_at
                FROM history
                WHERE user_id = ?1
                ORDER BY recorded_at ASC, id ASC
            ",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_history_row(&row)?);
        }
        Ok(out)
    }
}
