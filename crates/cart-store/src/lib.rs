//! Access to the remote transactional cart store.
//!
//! The store owns every cart invariant (stock checks, price math, merge
//! transactions) behind coarse procedure calls. This crate models those
//! procedures as the [`CartStore`] trait and interprets their
//! `{success, data|error}` envelopes.

pub mod envelope;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use envelope::StoreEnvelope;
pub use error::{RejectionCode, Result, StoreError};
pub use memory::InMemoryCartStore;
pub use postgres::PostgresCartStore;
pub use store::{CartStore, Procedure};
