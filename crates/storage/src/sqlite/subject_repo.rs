use async_trait::async_trait;
use reading_core::model::{Subject, SubjectId, UserId};

use super::SqliteRepository;
use super::mapping::{chapters_to_json, conn, id_i64, map_subject_row, subject_id_from_i64};
use crate::repository::{NewSubjectRecord, StorageError, SubjectRepository};

#[async_trait]
impl SubjectRepository for SqliteRepository {
    async fn insert_new_subject(
        &self,
        user: &UserId,
        subject: NewSubjectRecord,
    ) -> Result<SubjectId, StorageError> {
        let chapters = chapters_to_json(&subject.chapters)?;

        let res = sqlx::query(
            r"
            INSERT INTO subjects (user_id, name, chapters, version, created_at)
            VALUES (?1, ?2, ?3, 0, ?4)
            ",
        )
        .bind(user.as_str())
        .bind(subject.name)
        .bind(chapters)
        .bind(subject.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        subject_id_from_i64(res.last_insert_rowid())
    }

    async fn get_subject(
        &self,
        user: &UserId,
        id: SubjectId,
    ) -> Result<Option<Subject>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, name, chapters, version, created_at
            FROM subjects WHERE user_id = ?1 AND id = ?2
            ",
        )
        .bind(user.as_str())
        .bind(id_i64("subject_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_subject_row(&row).map(|(subject, _)| Some(subject)),
            None => Ok(None),
        }
    }

    async fn list_subjects(&self, user: &UserId) -> Result<Vec<Subject>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, chapters, version, created_at
            FROM subjects
            WHERE user_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut subjects = Vec::with_capacity(rows.len());
        for row in rows {
            subjects.push(map_subject_row(&row)?.0);
        }
        Ok(subjects)
    }
}
