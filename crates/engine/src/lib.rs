//! Cart orchestration over the remote cart store.
//!
//! A request flows through:
//! 1. [`IdentityResolver`] turns credentials into a [`SessionContext`]
//! 2. [`CartClient`] retries transient failures around the
//! 3. [`CartGateway`], which calls one store procedure and re-reads the cart
//!
//! At sign-in, [`MergeOrchestrator`] folds the guest cart into the user's
//! cart under a deadline.

pub mod client;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod merge;
pub mod outcome;
pub mod session;

pub use client::{CartClient, RetryPolicy};
pub use error::{CartError, ErrorKind, Result};
pub use gateway::{CartGateway, CartOperations};
pub use identity::{
    Credentials, IdentityResolver, ResolverSettings, StaticTokenVerifier, TokenVerifier,
    VerifyError,
};
pub use merge::{MergeOrchestrator, MergeOutcome, MergeSettings};
pub use outcome::{CartOutcome, CartView};
pub use session::{GuestCookieDirective, SessionContext};
