//! The acting party of a cart request.

use common::{GuestToken, UserId};
use serde::{Deserialize, Serialize};

/// Exactly one acting identity per request: an authenticated user or a guest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionIdentity {
    Authenticated { user_id: UserId },
    Guest { token: GuestToken },
}

impl SessionIdentity {
    pub fn authenticated(user_id: UserId) -> Self {
        SessionIdentity::Authenticated { user_id }
    }

    pub fn guest(token: GuestToken) -> Self {
        SessionIdentity::Guest { token }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionIdentity::Authenticated { .. })
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            SessionIdentity::Authenticated { user_id } => Some(*user_id),
            SessionIdentity::Guest { .. } => None,
        }
    }

    pub fn guest_token(&self) -> Option<&GuestToken> {
        match self {
            SessionIdentity::Authenticated { .. } => None,
            SessionIdentity::Guest { token } => Some(token),
        }
    }

    /// Short label used as a log and metrics field.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionIdentity::Authenticated { .. } => "authenticated",
            SessionIdentity::Guest { .. } => "guest",
        }
    }
}

impl std::fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionIdentity::Authenticated { user_id } => write!(f, "user:{user_id}"),
            // Guest tokens act as bearer secrets for the cart; never print them whole.
            SessionIdentity::Guest { token } => {
                let prefix: String = token.as_str().chars().take(6).collect();
                write!(f, "guest:{prefix}…")
            }
        }
    }
}
