use chrono::{DateTime, Utc};

use crate::model::ids::{ChapterId, HistoryId, SubjectId, UserId};
use crate::model::subject::Chapter;
use crate::time::minutes_from_secs;

/// Subject name stored when the subject is not known locally.
pub const UNKNOWN_SUBJECT_NAME: &str = "Unknown";

/// History entry before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryRecord {
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub chapter_id: Option<ChapterId>,
    pub chapter_name: String,
    pub duration_minutes: f64,
    pub recorded_at: DateTime<Utc>,
    pub user_id: UserId,
}

impl NewHistoryRecord {
    /// Builds a record for a finished timer session of `duration_secs`.
    #[must_use]
    pub fn from_session(
        user_id: UserId,
        subject_id: SubjectId,
        subject_name: Option<&str>,
        chapter_name: impl Into<String>,
        duration_secs: u64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id,
            subject_name: subject_name.unwrap_or(UNKNOWN_SUBJECT_NAME).to_owned(),
            chapter_id: None,
            chapter_name: chapter_name.into(),
            duration_minutes: minutes_from_secs(duration_secs),
            recorded_at,
            user_id,
        }
    }

    /// Points the record at the chapter the reading was applied to.
    ///
    /// A found chapter overrides the caller's name guess; `None` clears the id
    /// and keeps the name as given.
    #[must_use]
    pub fn with_resolved_chapter(mut self, chapter: Option<&Chapter>) -> Self {
        self.chapter_id = chapter.map(Chapter::id);
        if let Some(chapter) = chapter {
            self.chapter_name = chapter.name().to_owned();
        }
        self
    }

    #[must_use]
    pub fn into_record(self, id: HistoryId) -> HistoryRecord {
        HistoryRecord {
            id,
            subject_id: self.subject_id,
            subject_name: self.subject_name,
            chapter_id: self.chapter_id,
            chapter_name: self.chapter_name,
            duration_minutes: self.duration_minutes,
            recorded_at: self.recorded_at,
            user_id: self.user_id,
        }
    }
}

/// One completed, timed reading session. Never edited after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub chapter_id: Option<ChapterId>,
    pub chapter_name: String,
    pub duration_minutes: f64,
    pub recorded_at: DateTime<Utc>,
    pub user_id: UserId,
}
