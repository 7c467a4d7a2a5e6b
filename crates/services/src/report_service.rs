use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use tracing::warn;

use reading_core::model::GoalSettings;
use reading_core::stats::{GoalProgress, ReadingReport, ReadingStats, compute_stats, subject_report};

use crate::error::{AuthError, ReportError};
use crate::identity::{AdminPolicy, IdentityProvider};
use crate::live::LiveStore;

/// Everything the dashboard shows, derived from one set of snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub stats: ReadingStats,
    pub goals: GoalSettings,
    pub progress: GoalProgress,
}

/// Derives statistics from the live snapshots; never touches storage.
#[derive(Clone)]
pub struct ReportService {
    identity: Arc<dyn IdentityProvider>,
    admin: AdminPolicy,
    live: Arc<LiveStore>,
}

impl ReportService {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        admin: AdminPolicy,
        live: Arc<LiveStore>,
    ) -> Self {
        Self {
            identity,
            admin,
            live,
        }
    }

    #[must_use]
    pub fn stats<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> ReadingStats {
        let history = self.live.history();
        let subjects = self.live.subjects();
        compute_stats(&history, &subjects, now)
    }

    #[must_use]
    pub fn dashboard<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Dashboard {
        let stats = self.stats(now);
        let goals = *self.live.settings();
        let progress = stats.goal_progress(&goals);
        Dashboard {
            stats,
            goals,
            progress,
        }
    }

    /// Per-subject totals over the recorded history.
    ///
    /// Only covers the signed-in admin's own history.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::NotAuthorized` unless the signed-in user is the
    /// configured admin.
    pub fn admin_report(&self) -> Result<ReadingReport, ReportError> {
        let user = self.identity.current_user().ok_or(AuthError::NotSignedIn)?;
        if !self.admin.is_admin(&user) {
            warn!(user = %user, "admin report refused");
            return Err(ReportError::NotAuthorized);
        }
        Ok(subject_report(&self.live.history()))
    }
}
