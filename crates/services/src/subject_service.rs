use std::sync::Arc;

use tracing::{info, warn};

use reading_core::Clock;
use reading_core::model::{Subject, SubjectDraft, SubjectId};
use storage::repository::{NewSubjectRecord, SubjectRepository};

use crate::error::{AuthError, SubjectServiceError};
use crate::identity::IdentityProvider;
use crate::live::LiveStore;

/// Orchestrates subject creation and lookups for the signed-in user.
#[derive(Clone)]
pub struct SubjectService {
    clock: Clock,
    identity: Arc<dyn IdentityProvider>,
    subjects: Arc<dyn SubjectRepository>,
    live: Arc<LiveStore>,
}

impl SubjectService {
    #[must_use]
    pub fn new(
        clock: Clock,
        identity: Arc<dyn IdentityProvider>,
        subjects: Arc<dyn SubjectRepository>,
        live: Arc<LiveStore>,
    ) -> Self {
        Self {
            clock,
            identity,
            subjects,
            live,
        }
    }

    /// Validate and persist a new subject.
    ///
    /// # Errors
    ///
    /// Returns `SubjectServiceError::Subject` for validation failures and
    /// `SubjectServiceError::Storage` if persistence fails.
    pub async fn create_subject(
        &self,
        draft: SubjectDraft,
    ) -> Result<SubjectId, SubjectServiceError> {
        let user = self.identity.current_user().ok_or(AuthError::NotSignedIn)?;
        // Placeholder id; the store assigns the real one.
        let subject = draft.validate(SubjectId::new(0), self.clock.now())?;

        let id = match self
            .subjects
            .insert_new_subject(&user, NewSubjectRecord::from_subject(&subject))
            .await
        {
            Ok(id) => id,
            Err(err) => {
                warn!(user = %user, name = subject.name(), error = %err, "subject save failed");
                return Err(err.into());
            }
        };
        info!(user = %user, subject = %id, chapters = subject.chapters().len(), "subject created");

        self.live.refresh_subjects(&user).await;
        Ok(id)
    }

    /// Subjects of the signed-in user, read straight from storage.
    ///
    /// # Errors
    ///
    /// Returns `SubjectServiceError::Storage` if repository access fails.
    pub async fn list_subjects(&self) -> Result<Vec<Subject>, SubjectServiceError> {
        let user = self.identity.current_user().ok_or(AuthError::NotSignedIn)?;
        Ok(self.subjects.list_subjects(&user).await?)
    }

    /// Returns `Ok(None)` when the subject does not exist.
    ///
    /// # Errors
    ///
    /// Returns `SubjectServiceError::Storage` if repository access fails.
    pub async fn get_subject(&self, id: SubjectId) -> Result<Option<Subject>, SubjectServiceError> {
        let user = self.identity.current_user().ok_or(AuthError::NotSignedIn)?;
        Ok(self.subjects.get_subject(&user, id).await?)
    }
}
