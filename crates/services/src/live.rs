//! Live mirrors of the user's subjects, history and goal settings.
//!
//! Each collection is an independent `watch` channel holding the full current
//! snapshot. Publishing replaces the snapshot wholesale; subscribers drop
//! their receiver to unsubscribe.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use reading_core::model::{GoalSettings, HistoryRecord, Subject, UserId};
use storage::repository::Storage;

pub type SubjectsSnapshot = Arc<Vec<Subject>>;
pub type HistorySnapshot = Arc<Vec<HistoryRecord>>;
pub type SettingsSnapshot = Arc<GoalSettings>;

pub struct LiveStore {
    storage: Storage,
    subjects: watch::Sender<SubjectsSnapshot>,
    history: watch::Sender<HistorySnapshot>,
    settings: watch::Sender<SettingsSnapshot>,
}

impl LiveStore {
    /// Empty collections and default goals until the first refresh.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        let (subjects, _) = watch::channel(Arc::new(Vec::new()));
        let (history, _) = watch::channel(Arc::new(Vec::new()));
        let (settings, _) = watch::channel(Arc::new(GoalSettings::default()));
        Self {
            storage,
            subjects,
            history,
            settings,
        }
    }

    #[must_use]
    pub fn subscribe_subjects(&self) -> watch::Receiver<SubjectsSnapshot> {
        self.subjects.subscribe()
    }

    #[must_use]
    pub fn subscribe_history(&self) -> watch::Receiver<HistorySnapshot> {
        self.history.subscribe()
    }

    #[must_use]
    pub fn subscribe_settings(&self) -> watch::Receiver<SettingsSnapshot> {
        self.settings.subscribe()
    }

    #[must_use]
    pub fn subjects(&self) -> SubjectsSnapshot {
        Arc::clone(&self.subjects.borrow())
    }

    #[must_use]
    pub fn history(&self) -> HistorySnapshot {
        Arc::clone(&self.history.borrow())
    }

    #[must_use]
    pub fn settings(&self) -> SettingsSnapshot {
        Arc::clone(&self.settings.borrow())
    }

    pub fn publish_subjects(&self, subjects: Vec<Subject>) {
        self.subjects.send_replace(Arc::new(subjects));
    }

    pub fn publish_history(&self, history: Vec<HistoryRecord>) {
        self.history.send_replace(Arc::new(history));
    }

    pub fn publish_settings(&self, settings: GoalSettings) {
        self.settings.send_replace(Arc::new(settings));
    }

    /// Reload subjects from storage and publish them.
    ///
    /// On failure the error is logged and the last snapshot stays in place.
    /// Returns whether a new snapshot was published.
    pub async fn refresh_subjects(&self, user: &UserId) -> bool {
        match self.storage.subjects.list_subjects(user).await {
            Ok(subjects) => {
                debug!(user = %user, count = subjects.len(), "subjects refreshed");
                self.publish_subjects(subjects);
                true
            }
            Err(err) => {
                warn!(user = %user, error = %err, "subjects refresh failed");
                false
            }
        }
    }

    /// Reload history from storage and publish it. See `refresh_subjects`.
    pub async fn refresh_history(&self, user: &UserId) -> bool {
        match self.storage.history.list_history(user).await {
            Ok(history) => {
                debug!(user = %user, count = history.len(), "history refreshed");
                self.publish_history(history);
                true
            }
            Err(err) => {
                warn!(user = %user, error = %err, "history refresh failed");
                false
            }
        }
    }

    /// Reload goal settings, falling back to defaults when none are stored.
    pub async fn refresh_settings(&self, user: &UserId) -> bool {
        match self.storage.goals.get_goals(user).await {
            Ok(goals) => {
                debug!(user = %user, stored = goals.is_some(), "settings refreshed");
                self.publish_settings(goals.unwrap_or_default());
                true
            }
            Err(err) => {
                warn!(user = %user, error = %err, "settings refresh failed");
                false
            }
        }
    }

    /// Refresh all three collections. Returns true only if every one succeeded.
    pub async fn refresh_all(&self, user: &UserId) -> bool {
        let subjects = self.refresh_subjects(user).await;
        let history = self.refresh_history(user).await;
        let settings = self.refresh_settings(user).await;
        subjects && history && settings
    }
}
