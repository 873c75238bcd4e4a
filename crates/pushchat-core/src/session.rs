//! Session boundary
//!
//! Credential storage and refresh live outside this core; the runtime only
//! asks who the local user is (to suppress self-typing indicators) and which
//! token to attach when connecting. Both are opaque strings.

use crate::types::{AuthToken, UserId};

/// Provider of the current authenticated session
pub trait SessionProvider: Send + Sync {
    /// Identifier of the locally signed-in user
    fn user_id(&self) -> UserId;

    /// Current auth token, attached as connection metadata
    fn auth_token(&self) -> AuthToken;
}

/// Fixed session for tests and applications without token rotation
#[derive(Debug, Clone)]
pub struct StaticSession {
    user_id: UserId,
    token: AuthToken,
}

impl StaticSession {
    pub fn new(user_id: impl Into<UserId>, token: impl Into<AuthToken>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

impl SessionProvider for StaticSession {
    fn user_id(&self) -> UserId {
        self.user_id.clone()
    }

    fn auth_token(&self) -> AuthToken {
        self.token.clone()
    }
}
