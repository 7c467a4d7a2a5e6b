use std::sync::Arc;

use tracing::{debug, info, warn};

use reading_core::Clock;
use reading_core::model::{Chapter, ChapterKey, HistoryId, NewHistoryRecord, SubjectId};
use storage::repository::ReadingPersistence;

use crate::error::{AuthError, RecorderError};
use crate::identity::IdentityProvider;
use crate::live::LiveStore;

/// What a committed recording produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSession {
    pub history_id: HistoryId,
    /// The chapter after the update; `None` if it was not found in storage.
    pub chapter: Option<Chapter>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Recorded(RecordedSession),
    /// The session was shorter than a second; nothing was written.
    Skipped,
}

/// Commits finished timer sessions.
///
/// Each call appends one history record and advances the chapter's progress
/// in a single store transaction. Calls are not idempotent: the caller must
/// invoke it at most once per timer session.
#[derive(Clone)]
pub struct SessionRecorder {
    clock: Clock,
    identity: Arc<dyn IdentityProvider>,
    readings: Arc<dyn ReadingPersistence>,
    live: Arc<LiveStore>,
}

impl SessionRecorder {
    #[must_use]
    pub fn new(
        clock: Clock,
        identity: Arc<dyn IdentityProvider>,
        readings: Arc<dyn ReadingPersistence>,
        live: Arc<LiveStore>,
    ) -> Self {
        Self {
            clock,
            identity,
            readings,
            live,
        }
    }

    /// Record a session and report whether it was committed.
    ///
    /// Returns `false` when the commit failed (nothing was written, so the
    /// caller should keep the elapsed time for a retry) and also when the
    /// session was under a second long and therefore skipped.
    pub async fn record_reading(
        &self,
        subject_id: SubjectId,
        chapter: impl Into<ChapterKey>,
        duration_secs: u64,
    ) -> bool {
        matches!(
            self.try_record_reading(subject_id, chapter, duration_secs).await,
            Ok(RecordOutcome::Recorded(_))
        )
    }

    /// Record a session, returning the typed outcome.
    ///
    /// # Errors
    ///
    /// Returns `RecorderError::Auth` if no user is signed in and
    /// `RecorderError::Storage` if the transaction fails.
    pub async fn try_record_reading(
        &self,
        subject_id: SubjectId,
        chapter: impl Into<ChapterKey>,
        duration_secs: u64,
    ) -> Result<RecordOutcome, RecorderError> {
        let key = chapter.into();
        if duration_secs < 1 {
            debug!(subject = %subject_id, chapter = %key, "skipping sub-second session");
            return Ok(RecordOutcome::Skipped);
        }

        let user = self.identity.current_user().ok_or(AuthError::NotSignedIn)?;

        let subjects = self.live.subjects();
        let known = subjects.iter().find(|s| s.id() == subject_id);
        let known_chapter = known.and_then(|s| s.chapter(&key));
        let chapter_name = match &key {
            ChapterKey::Name(name) => name.trim().to_owned(),
            ChapterKey::Id(_) => key.to_string(),
        };

        let record = NewHistoryRecord::from_session(
            user.clone(),
            subject_id,
            known.map(|s| s.name()),
            chapter_name,
            duration_secs,
            self.clock.now(),
        )
        .with_resolved_chapter(known_chapter);
        let minutes = record.duration_minutes;

        let committed = match self.readings.commit_reading(&user, record, &key).await {
            Ok(committed) => committed,
            Err(err) => {
                warn!(
                    user = %user,
                    subject = %subject_id,
                    chapter = %key,
                    duration_secs,
                    error = %err,
                    "reading session was not recorded"
                );
                return Err(err.into());
            }
        };

        info!(
            user = %user,
            subject = %subject_id,
            chapter = %key,
            minutes,
            history_id = %committed.history_id,
            subject_found = committed.subject_found,
            "reading session recorded"
        );

        self.live.refresh_subjects(&user).await;
        self.live.refresh_history(&user).await;

        Ok(RecordOutcome::Recorded(RecordedSession {
            history_id: committed.history_id,
            chapter: committed.chapter,
        }))
    }
}
