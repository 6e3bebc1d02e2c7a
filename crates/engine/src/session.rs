//! Per-request session state threaded through cart calls.

use common::{GuestToken, UserId};
use domain::SessionIdentity;

/// What the response should do with the client's guest-token cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuestCookieDirective {
    /// Leave the cookie untouched.
    #[default]
    Keep,
    /// (Re)issue the cookie with a full lifetime.
    Refresh,
    /// Expire the cookie.
    Clear,
}

/// The acting identity of a request plus the guest token the client holds.
///
/// An authenticated request may still carry a guest token: it is the one a
/// sign-in merge folds into the user's cart, and it is only retired by
/// [`confirm_merge`](Self::confirm_merge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    identity: SessionIdentity,
    guest_token: Option<GuestToken>,
    cookie: GuestCookieDirective,
}

impl SessionContext {
    /// A session for a guest token the client already holds.
    pub fn for_guest(token: GuestToken) -> Self {
        Self {
            identity: SessionIdentity::guest(token.clone()),
            guest_token: Some(token),
            cookie: GuestCookieDirective::Keep,
        }
    }

    /// A session for a freshly minted guest token.
    pub fn start_guest() -> Self {
        Self {
            cookie: GuestCookieDirective::Refresh,
            ..Self::for_guest(GuestToken::generate())
        }
    }

    pub fn for_user(user_id: UserId, guest_token: Option<GuestToken>) -> Self {
        Self {
            identity: SessionIdentity::authenticated(user_id),
            guest_token,
            cookie: GuestCookieDirective::Keep,
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn guest_token(&self) -> Option<&GuestToken> {
        self.guest_token.as_ref()
    }

    pub fn cookie(&self) -> GuestCookieDirective {
        self.cookie
    }

    /// Extends the guest cookie after a write by a guest.
    pub fn touch(&mut self) {
        if !self.identity.is_authenticated() && self.cookie == GuestCookieDirective::Keep {
            self.cookie = GuestCookieDirective::Refresh;
        }
    }

    /// Switches the acting identity to `user_id`, keeping any guest token.
    pub fn authenticate(&mut self, user_id: UserId) {
        self.identity = SessionIdentity::authenticated(user_id);
    }

    /// Retires the guest token. Call only after the store confirmed a merge.
    pub fn confirm_merge(&mut self) {
        self.guest_token = None;
        self.cookie = GuestCookieDirective::Clear;
    }
}
