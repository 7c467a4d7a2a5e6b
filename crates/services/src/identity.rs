use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use reading_core::model::UserId;

use crate::error::AuthError;

/// Supplies the identity every read and write is scoped to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate and return the stable user id.
    ///
    /// Repeated calls return the same id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` if the provider refuses the credentials.
    async fn sign_in(&self) -> Result<UserId, AuthError>;

    /// The signed-in user, if `sign_in` has succeeded.
    fn current_user(&self) -> Option<UserId>;
}

/// Anonymous sign-in: a random id minted on first use.
#[derive(Debug, Default)]
pub struct AnonymousIdentity {
    user: Mutex<Option<UserId>>,
}

impl AnonymousIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a previously minted anonymous id.
    #[must_use]
    pub fn resume(user: UserId) -> Self {
        Self {
            user: Mutex::new(Some(user)),
        }
    }
}

#[async_trait]
impl IdentityProvider for AnonymousIdentity {
    async fn sign_in(&self) -> Result<UserId, AuthError> {
        let mut guard = self
            .user
            .lock()
            .map_err(|e| AuthError::Rejected(e.to_string()))?;
        if let Some(user) = guard.as_ref() {
            return Ok(user.clone());
        }
        let user = UserId::new(Uuid::new_v4().to_string())
            .map_err(|e| AuthError::Rejected(e.to_string()))?;
        info!(user = %user, "signed in anonymously");
        *guard = Some(user.clone());
        Ok(user)
    }

    fn current_user(&self) -> Option<UserId> {
        self.user.lock().ok().and_then(|guard| guard.clone())
    }
}

/// Token sign-in: the token is the provider-issued user id.
#[derive(Debug)]
pub struct TokenIdentity {
    token: String,
    user: Mutex<Option<UserId>>,
}

impl TokenIdentity {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user: Mutex::new(None),
        }
    }
}

#[async_trait]
impl IdentityProvider for TokenIdentity {
    async fn sign_in(&self) -> Result<UserId, AuthError> {
        let user = UserId::new(self.token.as_str())
            .map_err(|_| AuthError::Rejected("empty token".into()))?;
        let mut guard = self
            .user
            .lock()
            .map_err(|e| AuthError::Rejected(e.to_string()))?;
        *guard = Some(user.clone());
        info!(user = %user, "signed in with token");
        Ok(user)
    }

    fn current_user(&self) -> Option<UserId> {
        self.user.lock().ok().and_then(|guard| guard.clone())
    }
}

/// Which identity may open the admin report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminPolicy {
    admin_user: Option<UserId>,
}

impl AdminPolicy {
    #[must_use]
    pub fn new(admin_user: Option<UserId>) -> Self {
        Self { admin_user }
    }

    #[must_use]
    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admin_user.as_ref() == Some(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn anonymous_identity_is_stable() {
        let identity = AnonymousIdentity::new();
        assert!(identity.current_user().is_none());

        let first = identity.sign_in().await.unwrap();
        let second = identity.sign_in().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(identity.current_user(), Some(first));
    }

    #[tokio::test]
    async fn blank_token_is_rejected() {
        let identity = TokenIdentity::new("  ");
        assert!(matches!(identity.sign_in().await, Err(AuthError::Rejected(_))));
        assert!(identity.current_user().is_none());
    }

    #[tokio::test]
    async fn token_identity_uses_token_as_user() {
        let identity = TokenIdentity::new(" reader-7 ");
        let user = identity.sign_in().await.unwrap();
        assert_eq!(user.as_str(), "reader-7");
    }

    #[test]
    fn admin_policy_matches_configured_user() {
        let admin = UserId::new("boss").unwrap();
        let policy = AdminPolicy::new(Some(admin.clone()));
        assert!(policy.is_admin(&admin));
        assert!(!policy.is_admin(&UserId::new("reader").unwrap()));
        assert!(!AdminPolicy::default().is_admin(&admin));
    }
}
