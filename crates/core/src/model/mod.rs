mod goals;
mod history;
mod ids;
mod subject;

pub use goals::{
    DEFAULT_DAILY_GOAL_MINUTES, DEFAULT_WEEKLY_GOAL_MINUTES, GoalSettings, GoalSettingsDraft,
    GoalSettingsError,
};
pub use history::{HistoryRecord, NewHistoryRecord, UNKNOWN_SUBJECT_NAME};
pub use ids::{ChapterId, HistoryId, IdError, SubjectId, UserId};
pub use subject::{Chapter, ChapterDraft, ChapterKey, Subject, SubjectDraft, SubjectError};
