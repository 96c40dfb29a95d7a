//! Logged-in user lookup supplied by the transport layer.

use async_trait::async_trait;

/// Answers who, if anyone, is logged in for the current request.
#[async_trait]
pub trait SessionContext: Send + Sync {
    /// Username of the logged-in user.
    async fn current_user(&self) -> Option<String>;

    /// Returns `true` if a user is logged in.
    async fn is_logged_in(&self) -> bool {
        self.current_user().await.is_some()
    }
}

/// A session whose user is known up front.
///
/// Used by the command line tool and in tests, where no HTTP session exists.
#[derive(Debug, Clone, Default)]
pub struct FixedSession {
    user: Option<String>,
}

impl FixedSession {
    #[must_use]
    pub fn logged_in(username: impl Into<String>) -> Self {
        Self {
            user: Some(username.into()),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionContext for FixedSession {
    async fn current_user(&self) -> Option<String> {
        self.user.clone()
    }
}
