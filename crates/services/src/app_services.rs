use std::sync::Arc;

use tracing::{info, warn};

use reading_core::model::UserId;
use storage::repository::Storage;

use crate::Clock;
use crate::error::BootstrapError;
use crate::goal_service::GoalService;
use crate::identity::{AdminPolicy, IdentityProvider};
use crate::live::LiveStore;
use crate::recorder::SessionRecorder;
use crate::report_service::ReportService;
use crate::subject_service::SubjectService;

/// Signs in, primes the live collections and assembles app-facing services.
#[derive(Clone)]
pub struct AppServices {
    user: UserId,
    live: Arc<LiveStore>,
    subjects: Arc<SubjectService>,
    goals: Arc<GoalService>,
    recorder: Arc<SessionRecorder>,
    reports: Arc<ReportService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError` if storage cannot be opened or sign-in is
    /// rejected.
    pub async fn new_sqlite(
        db_url: &str,
        identity: Arc<dyn IdentityProvider>,
        admin: AdminPolicy,
        clock: Clock,
    ) -> Result<Self, BootstrapError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::bootstrap(storage, identity, admin, clock).await
    }

    /// Build services over an already opened storage.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError::Auth` if sign-in is rejected.
    pub async fn bootstrap(
        storage: Storage,
        identity: Arc<dyn IdentityProvider>,
        admin: AdminPolicy,
        clock: Clock,
    ) -> Result<Self, BootstrapError> {
        let user = identity.sign_in().await?;

        let live = Arc::new(LiveStore::new(storage.clone()));
        if !live.refresh_all(&user).await {
            warn!(user = %user, "starting with partially loaded data");
        }

        let subjects = Arc::new(SubjectService::new(
            clock,
            Arc::clone(&identity),
            Arc::clone(&storage.subjects),
            Arc::clone(&live),
        ));
        let goals = Arc::new(GoalService::new(
            Arc::clone(&identity),
            Arc::clone(&storage.goals),
            Arc::clone(&live),
        ));
        let recorder = Arc::new(SessionRecorder::new(
            clock,
            Arc::clone(&identity),
            Arc::clone(&storage.readings),
            Arc::clone(&live),
        ));
        let reports = Arc::new(ReportService::new(identity, admin, Arc::clone(&live)));

        info!(user = %user, "services ready");
        Ok(Self {
            user,
            live,
            subjects,
            goals,
            recorder,
            reports,
        })
    }

    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.user
    }

    #[must_use]
    pub fn live(&self) -> Arc<LiveStore> {
        Arc::clone(&self.live)
    }

    #[must_use]
    pub fn subjects(&self) -> Arc<SubjectService> {
        Arc::clone(&self.subjects)
    }

    #[must_use]
    pub fn goals(&self) -> Arc<GoalService> {
        Arc::clone(&self.goals)
    }

    #[must_use]
    pub fn recorder(&self) -> Arc<SessionRecorder> {
        Arc::clone(&self.recorder)
    }

    #[must_use]
    pub fn reports(&self) -> Arc<ReportService> {
        Arc::clone(&self.reports)
    }
}
