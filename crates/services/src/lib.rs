#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod goal_service;
pub mod identity;
pub mod live;
pub mod recorder;
pub mod report_service;
pub mod subject_service;

pub use reading_core::Clock;

pub use app_services::AppServices;
pub use error::{
    AuthError, BootstrapError, GoalServiceError, RecorderError, ReportError, SubjectServiceError,
};
pub use goal_service::GoalService;
pub use identity::{AdminPolicy, AnonymousIdentity, IdentityProvider, TokenIdentity};
pub use live::LiveStore;
pub use recorder::{RecordOutcome, RecordedSession, SessionRecorder};
pub use report_service::{Dashboard, ReportService};
pub use subject_service::SubjectService;
