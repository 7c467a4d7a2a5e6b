use std::sync::Arc;

use tracing::{info, warn};

use reading_core::model::{GoalSettings, GoalSettingsDraft};
use storage::repository::GoalSettingsRepository;

use crate::error::{AuthError, GoalServiceError};
use crate::identity::IdentityProvider;
use crate::live::LiveStore;

#[derive(Clone)]
pub struct GoalService {
    identity: Arc<dyn IdentityProvider>,
    repo: Arc<dyn GoalSettingsRepository>,
    live: Arc<LiveStore>,
}

impl GoalService {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        repo: Arc<dyn GoalSettingsRepository>,
        live: Arc<LiveStore>,
    ) -> Self {
        Self {
            identity,
            repo,
            live,
        }
    }

    /// Load persisted goals (or defaults if none were saved yet).
    ///
    /// # Errors
    ///
    /// Returns `GoalServiceError` on storage failures.
    pub async fn load(&self) -> Result<GoalSettings, GoalServiceError> {
        let user = self.identity.current_user().ok_or(AuthError::NotSignedIn)?;
        let goals = self.repo.get_goals(&user).await?;
        Ok(goals.unwrap_or_default())
    }

    /// Merge the draft over the current goals and persist the result.
    ///
    /// # Errors
    ///
    /// Returns `GoalServiceError` if validation fails or persistence fails.
    pub async fn save(&self, draft: GoalSettingsDraft) -> Result<GoalSettings, GoalServiceError> {
        let user = self.identity.current_user().ok_or(AuthError::NotSignedIn)?;
        let current = self.load().await?;
        let goals = draft.merge_into(&current)?;

        if let Err(err) = self.repo.save_goals(&user, &goals).await {
            warn!(user = %user, error = %err, "goal save failed");
            return Err(err.into());
        }
        info!(
            user = %user,
            daily = goals.daily_goal_minutes(),
            weekly = goals.weekly_goal_minutes(),
            "goals saved"
        );

        self.live.publish_settings(goals);
        Ok(goals)
    }
}
