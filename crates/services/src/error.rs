//! Shared error types for the services crate.

use thiserror::Error;

use reading_core::model::{GoalSettingsError, SubjectError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by identity providers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthError {
    #[error("sign-in rejected: {0}")]
    Rejected(String),
    #[error("no signed-in user")]
    NotSignedIn,
}

/// Errors emitted by `SessionRecorder`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecorderError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SubjectService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubjectServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Subject(#[from] SubjectError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `GoalService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GoalServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Goals(#[from] GoalSettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ReportService`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReportError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("the admin report is restricted to the admin user")]
    NotAuthorized,
}

/// Errors emitted while bootstrapping app services. All of them are fatal.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
