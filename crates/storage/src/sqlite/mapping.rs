use reading_core::model::{
    Chapter, ChapterId, GoalSettings, HistoryId, HistoryRecord, Subject, SubjectId, UserId,
};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn subject_id_from_i64(v: i64) -> Result<SubjectId, StorageError> {
    Ok(SubjectId::new(i64_to_u64("subject_id", v)?))
}

pub(crate) fn history_id_from_i64(v: i64) -> Result<HistoryId, StorageError> {
    Ok(HistoryId::new(i64_to_u64("history_id", v)?))
}

/// Column shape of one chapter inside `subjects.chapters`.
#[derive(Debug, Serialize, Deserialize)]
struct ChapterColumn {
    id: u64,
    name: String,
    total: u32,
    read: f64,
    is_completed: bool,
}

pub(crate) fn chapters_to_json(chapters: &[Chapter]) -> Result<String, StorageError> {
    let columns: Vec<ChapterColumn> = chapters
        .iter()
        .map(|c| ChapterColumn {
            id: c.id().value(),
            name: c.name().to_owned(),
            total: c.total(),
            read: c.read(),
            is_completed: c.is_completed(),
        })
        .collect();
    serde_json::to_string(&columns).map_err(ser)
}

pub(crate) fn chapters_from_json(raw: &str) -> Result<Vec<Chapter>, StorageError> {
    let columns: Vec<ChapterColumn> = serde_json::from_str(raw).map_err(ser)?;
    columns
        .into_iter()
        .map(|c| {
            Chapter::from_persisted(ChapterId::new(c.id), c.name, c.total, c.read, c.is_completed)
                .map_err(ser)
        })
        .collect()
}

/// Maps a `subjects` row; also returns the row's optimistic version.
pub(crate) fn map_subject_row(row: &SqliteRow) -> Result<(Subject, i64), StorageError> {
    let id = subject_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let chapters = chapters_from_json(&row.try_get::<String, _>("chapters").map_err(ser)?)?;
    let version: i64 = row.try_get("version").map_err(ser)?;
    let subject = Subject::from_persisted(
        id,
        row.try_get::<String, _>("name").map_err(ser)?,
        chapters,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)?;
    Ok((subject, version))
}

pub(crate) fn map_history_row(row: &SqliteRow) -> Result<HistoryRecord, StorageError> {
    let chapter_id = row
        .try_get::<Option<i64>, _>("chapter_id")
        .map_err(ser)?
        .map(|v| i64_to_u64("chapter_id", v).map(ChapterId::new))
        .transpose()?;

    Ok(HistoryRecord {
        id: history_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        subject_id: subject_id_from_i64(row.try_get::<i64, _>("subject_id").map_err(ser)?)?,
        subject_name: row.try_get("subject_name").map_err(ser)?,
        chapter_id,
        chapter_name: row.try_get("chapter_name").map_err(ser)?,
        duration_minutes: row.try_get("duration_minutes").map_err(ser)?,
        recorded_at: row.try_get("recorded_at").map_err(ser)?,
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?,
    })
}

pub(crate) fn map_goals_row(row: &SqliteRow) -> Result<GoalSettings, StorageError> {
    let daily: i64 = row.try_get("daily_goal_minutes").map_err(ser)?;
    let weekly: i64 = row.try_get("weekly_goal_minutes").map_err(ser)?;
    let daily = u32::try_from(daily).map_err(|_| ser(format!("invalid daily goal: {daily}")))?;
    let weekly = u32::try_from(weekly).map_err(|_| ser(format!("invalid weekly goal: {weekly}")))?;
    GoalSettings::new(daily, weekly).map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapters_json_round_trip_keeps_progress() {
        let chapters = vec![
            Chapter::from_persisted(ChapterId::new(1), "Algebra", 100, 70.5, false).unwrap(),
            Chapter::from_persisted(ChapterId::new(2), "Free", 0, 3.0, true).unwrap(),
        ];
        let raw = chapters_to_json(&chapters).unwrap();
        assert_eq!(chapters_from_json(&raw).unwrap(), chapters);
    }

    #[test]
    fn rejects_negative_read_minutes() {
        let raw = r#"[{"id":1,"name":"A","total":10,"read":-1.0,"is_completed":false}]"#;
        assert!(matches!(
            chapters_from_json(raw),
            Err(StorageError::Serialization(_))
        ));
    }
}
