use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reading_core::model::{
    Chapter, ChapterKey, GoalSettings, HistoryId, HistoryRecord, NewHistoryRecord, Subject,
    SubjectError, SubjectId, UserId,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// How many times a reading commit is attempted before a version conflict is
/// reported to the caller.
pub const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Insert shape for a subject; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewSubjectRecord {
    pub name: String,
    pub chapters: Vec<Chapter>,
    pub created_at: DateTime<Utc>,
}

impl NewSubjectRecord {
    #[must_use]
    pub fn from_subject(subject: &Subject) -> Self {
        Self {
            name: subject.name().to_owned(),
            chapters: subject.chapters().to_vec(),
            created_at: subject.created_at(),
        }
    }

    /// # Errors
    ///
    /// Returns `SubjectError` if the stored fields no longer validate.
    pub fn into_subject(self, id: SubjectId) -> Result<Subject, SubjectError> {
        Subject::from_persisted(id, self.name, self.chapters, self.created_at)
    }
}

/// Result of an atomic reading commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedReading {
    pub history_id: HistoryId,
    /// The chapter after the update; `None` if the subject or chapter was missing.
    pub chapter: Option<Chapter>,
    pub subject_found: bool,
}

/// Subjects live under the owning user; lookups for another user's subject
/// behave as if it did not exist.
#[async_trait]
pub trait SubjectRepository: Send + Sync {
    /// Persist a new subject and return its store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the subject cannot be stored.
    async fn insert_new_subject(
        &self,
        user: &UserId,
        subject: NewSubjectRecord,
    ) -> Result<SubjectId, StorageError>;

    /// Fetch a subject by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_subject(&self, user: &UserId, id: SubjectId)
    -> Result<Option<Subject>, StorageError>;

    /// All subjects of the user ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_subjects(&self, user: &UserId) -> Result<Vec<Subject>, StorageError>;
}

/// Append-only reading log. Records are only written through `ReadingPersistence`.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// All records of the user ordered by `recorded_at`, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_history(&self, user: &UserId) -> Result<Vec<HistoryRecord>, StorageError>;
}

#[async_trait]
pub trait GoalSettingsRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_goals(&self, user: &UserId) -> Result<Option<GoalSettings>, StorageError>;

    /// Insert or overwrite the user's goals.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the settings cannot be stored.
    async fn save_goals(&self, user: &UserId, goals: &GoalSettings) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ReadingPersistence: Send + Sync {
    /// Append `record` and add its minutes to the chapter selected by
    /// `chapter`, as one atomic unit.
    ///
    /// A missing subject or chapter still commits the history record. Either
    /// both writes become visible or neither does.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if `record` belongs to another user or
    /// the subject kept changing underneath the commit, and other storage
    /// errors if the transaction fails.
    async fn commit_reading(
        &self,
        user: &UserId,
        record: NewHistoryRecord,
        chapter: &ChapterKey,
    ) -> Result<CommittedReading, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    next_subject_id: u64,
    next_history_id: u64,
    subjects: BTreeMap<SubjectId, (UserId, Subject)>,
    history: Vec<HistoryRecord>,
    goals: BTreeMap<UserId, GoalSettings>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// One lock guards all collections, so a reading commit is staged and
/// published while holding it.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit_reading` fail after the history record is staged
    /// and before the subject update lands.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl SubjectRepository for InMemoryRepository {
    async fn insert_new_subject(
        &self,
        user: &UserId,
        subject: NewSubjectRecord,
    ) -> Result<SubjectId, StorageError> {
        let mut guard = self.lock()?;
        guard.next_subject_id += 1;
        let id = SubjectId::new(guard.next_subject_id);
        let subject = subject
            .into_subject(id)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.subjects.insert(id, (user.clone(), subject));
        Ok(id)
    }

    async fn get_subject(
        &self,
        user: &UserId,
        id: SubjectId,
    ) -> Result<Option<Subject>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .subjects
            .get(&id)
            .filter(|(owner, _)| owner == user)
            .map(|(_, subject)| subject.clone()))
    }

    async fn list_subjects(&self, user: &UserId) -> Result<Vec<Subject>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .subjects
            .values()
            .filter(|(owner, _)| owner == user)
            .map(|(_, subject)| subject.clone())
            .collect())
    }
}

#[async_trait]
impl HistoryRepository for InMemoryRepository {
    async fn list_history(&self, user: &UserId) -> Result<Vec<HistoryRecord>, StorageError> {
        let guard = self.lock()?;
        let mut records: Vec<HistoryRecord> = guard
            .history
            .iter()
            .filter(|r| &r.user_id == user)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.recorded_at, r.id));
        Ok(records)
    }
}

#[async_trait]
impl GoalSettingsRepository for InMemoryRepository {
    async fn get_goals(&self, user: &UserId) -> Result<Option<GoalSettings>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.goals.get(user).copied())
    }

    async fn save_goals(&self, user: &UserId, goals: &GoalSettings) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.goals.insert(user.clone(), *goals);
        Ok(())
    }
}

#[async_trait]
impl ReadingPersistence for InMemoryRepository {
    async fn commit_reading(
        &self,
        user: &UserId,
        record: NewHistoryRecord,
        chapter: &ChapterKey,
    ) -> Result<CommittedReading, StorageError> {
        if &record.user_id != user {
            return Err(StorageError::Conflict);
        }

        let mut guard = self.lock()?;

        // Stage both writes against copies; nothing is published until the end.
        let mut subject = guard
            .subjects
            .get(&record.subject_id)
            .filter(|(owner, _)| owner == user)
            .map(|(_, subject)| subject.clone());
        let updated = subject
            .as_mut()
            .and_then(|s| s.apply_reading(chapter, record.duration_minutes).cloned());

        let history_id = HistoryId::new(guard.next_history_id + 1);
        let staged = record
            .with_resolved_chapter(updated.as_ref())
            .into_record(history_id);

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Connection("injected commit failure".into()));
        }

        guard.next_history_id += 1;
        guard.history.push(staged);
        let subject_found = subject.is_some();
        if let Some(subject) = subject {
            guard
                .subjects
                .insert(subject.id(), (user.clone(), subject));
        }

        Ok(CommittedReading {
            history_id,
            chapter: updated,
            subject_found,
        })
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub subjects: Arc<dyn SubjectRepository>,
    pub history: Arc<dyn HistoryRepository>,
    pub goals: Arc<dyn GoalSettingsRepository>,
    pub readings: Arc<dyn ReadingPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    /// Wrap an existing in-memory repository, keeping a handle for tests.
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let subjects: Arc<dyn SubjectRepository> = Arc::new(repo.clone());
        let history: Arc<dyn HistoryRepository> = Arc::new(repo.clone());
        let goals: Arc<dyn GoalSettingsRepository> = Arc::new(repo.clone());
        let readings: Arc<dyn ReadingPersistence> = Arc::new(repo);
        Self {
            subjects,
            history,
            goals,
            readings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reading_core::model::{ChapterId, SubjectDraft};
    use reading_core::time::fixed_now;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn algebra_record() -> NewSubjectRecord {
        let subject = SubjectDraft::new("Math")
            .with_chapter("Algebra", 100)
            .validate(SubjectId::new(1), fixed_now())
            .unwrap();
        NewSubjectRecord::from_subject(&subject)
    }

    fn reading(user: &UserId, subject: SubjectId, secs: u64) -> NewHistoryRecord {
        NewHistoryRecord::from_session(
            user.clone(),
            subject,
            Some("Math"),
            "Algebra",
            secs,
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn subjects_are_scoped_per_user() {
        let repo = InMemoryRepository::new();
        let alice = user("alice");
        let bob = user("bob");
        let id = repo.insert_new_subject(&alice, algebra_record()).await.unwrap();

        assert!(repo.get_subject(&alice, id).await.unwrap().is_some());
        assert!(repo.get_subject(&bob, id).await.unwrap().is_none());
        assert!(repo.list_subjects(&bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_updates_history_and_chapter() {
        let repo = InMemoryRepository::new();
        let alice = user("alice");
        let id = repo.insert_new_subject(&alice, algebra_record()).await.unwrap();

        let committed = repo
            .commit_reading(&alice, reading(&alice, id, 1800), &ChapterKey::from("Algebra"))
            .await
            .unwrap();

        assert!(committed.subject_found);
        let chapter = committed.chapter.unwrap();
        assert!((chapter.read() - 30.0).abs() < 1e-9);

        let history = repo.list_history(&alice).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].chapter_id, Some(chapter.id()));
    }

    #[tokio::test]
    async fn history_takes_chapter_name_from_store() {
        let repo = InMemoryRepository::new();
        let alice = user("alice");
        let id = repo.insert_new_subject(&alice, algebra_record()).await.unwrap();
        let mut record = reading(&alice, id, 60);
        record.chapter_name = "#1".into();

        repo.commit_reading(&alice, record, &ChapterKey::Id(ChapterId::new(1)))
            .await
            .unwrap();

        let history = repo.list_history(&alice).await.unwrap();
        assert_eq!(history[0].chapter_name, "Algebra");
        assert_eq!(history[0].chapter_id, Some(ChapterId::new(1)));
    }

    #[tokio::test]
    async fn injected_failure_leaves_nothing_behind() {
        let repo = InMemoryRepository::new();
        let alice = user("alice");
        let id = repo.insert_new_subject(&alice, algebra_record()).await.unwrap();
        repo.fail_next_commit();

        let result = repo
            .commit_reading(&alice, reading(&alice, id, 600), &ChapterKey::from("Algebra"))
            .await;

        assert!(matches!(result, Err(StorageError::Connection(_))));
        assert!(repo.list_history(&alice).await.unwrap().is_empty());
        let subject = repo.get_subject(&alice, id).await.unwrap().unwrap();
        assert!(subject.chapters()[0].read().abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn commit_rejects_foreign_record() {
        let repo = InMemoryRepository::new();
        let alice = user("alice");
        let bob = user("bob");
        let result = repo
            .commit_reading(
                &bob,
                reading(&alice, SubjectId::new(1), 60),
                &ChapterKey::from("Algebra"),
            )
            .await;
        assert!(matches!(result, Err(StorageError::Conflict)));
    }

    #[tokio::test]
    async fn missing_subject_still_records_history() {
        let repo = InMemoryRepository::new();
        let alice = user("alice");
        let committed = repo
            .commit_reading(
                &alice,
                reading(&alice, SubjectId::new(77), 60),
                &ChapterKey::from("Algebra"),
            )
            .await
            .unwrap();

        assert!(!committed.subject_found);
        assert!(committed.chapter.is_none());
        assert_eq!(repo.list_history(&alice).await.unwrap().len(), 1);
    }
}
