//! Identity Resolver: turns request credentials into a [`SessionContext`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{GuestToken, UserId};
use thiserror::Error;

use crate::error::{CartError, Result};
use crate::session::SessionContext;

/// Why a bearer credential did not verify.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("credential rejected")]
    Invalid,
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

/// The auth layer's credential check.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> std::result::Result<UserId, VerifyError>;
}

/// Verifier backed by a fixed token table, for development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: Arc<HashMap<String, UserId>>,
    offline: Arc<AtomicBool>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, UserId>) -> Self {
        Self {
            tokens: Arc::new(tokens),
            offline: Arc::default(),
        }
    }

    /// Simulates an outage of the verification service.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> std::result::Result<UserId, VerifyError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(VerifyError::Unavailable(
                "verification service unreachable".to_string(),
            ));
        }
        self.tokens.get(token).copied().ok_or(VerifyError::Invalid)
    }
}

/// Raw credentials taken from a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub bearer: Option<String>,
    pub guest_token: Option<String>,
}

impl Credentials {
    /// Builds credentials from an `Authorization` header value and a guest token.
    pub fn from_headers(authorization: Option<&str>, guest_token: Option<&str>) -> Self {
        let bearer = authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        let guest_token = guest_token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        Self {
            bearer,
            guest_token,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolverSettings {
    /// The service's static public key. Clients may send it as a bearer; it
    /// never identifies a user.
    pub public_api_key: Option<String>,
}

/// True when `token` has the shape of a signed token: three non-empty
/// base64url segments separated by dots.
pub fn looks_signed(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3
        && segments.iter().all(|s| {
            !s.is_empty()
                && s.bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'=')
        })
}

/// Resolves exactly one acting identity per request.
#[derive(Clone)]
pub struct IdentityResolver {
    verifier: Arc<dyn TokenVerifier>,
    settings: ResolverSettings,
}

impl IdentityResolver {
    pub fn new(verifier: Arc<dyn TokenVerifier>, settings: ResolverSettings) -> Self {
        Self { verifier, settings }
    }

    /// Resolves credentials in order: verified bearer, then guest token.
    ///
    /// A bearer that fails verification degrades to the guest token rather
    /// than failing the request. With neither, the request needs auth.
    #[tracing::instrument(skip_all)]
    pub async fn resolve(&self, credentials: &Credentials) -> Result<SessionContext> {
        let guest_token = credentials.guest_token.as_deref().map(GuestToken::parse);

        let mut degraded = false;
        if let Some(bearer) = credentials.bearer.as_deref()
            && self.settings.public_api_key.as_deref() != Some(bearer)
        {
            match self.verifier.verify(bearer).await {
                Ok(user_id) => {
                    metrics::counter!("identity_resolutions_total", "kind" => "authenticated")
                        .increment(1);
                    let guest_token = match guest_token {
                        Some(Ok(token)) => Some(token),
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "ignoring malformed guest token");
                            None
                        }
                        None => None,
                    };
                    return Ok(SessionContext::for_user(user_id, guest_token));
                }
                Err(e) if looks_signed(bearer) => {
                    tracing::warn!(error = %e, "bearer verification failed, degrading to guest");
                    degraded = true;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring unverifiable bearer");
                }
            }
        }

        match guest_token {
            Some(Ok(token)) => {
                let kind = if degraded { "degraded" } else { "guest" };
                metrics::counter!("identity_resolutions_total", "kind" => kind).increment(1);
                Ok(SessionContext::for_guest(token))
            }
            Some(Err(e)) => {
                metrics::counter!("identity_resolutions_total", "kind" => "rejected").increment(1);
                Err(CartError::validation(format!("Invalid guest token: {e}")))
            }
            None => {
                metrics::counter!("identity_resolutions_total", "kind" => "rejected").increment(1);
                Err(CartError::AuthRequired)
            }
        }
    }
}
