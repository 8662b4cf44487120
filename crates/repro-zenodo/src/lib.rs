//! Zenodo publishing for reproducible notebook archives.
//!
//! Drives the deposit → upload → (publish) protocol with bearer-token
//! authentication, a client-level timeout, and bounded retries of
//! idempotent requests.

pub mod client;
pub mod error;
pub mod metadata;
pub mod types;

pub use client::ZenodoClient;
pub use error::{PublishError, ZenodoResult};
pub use metadata::{Creator, DepositionMetadata};
pub use types::{DepositionId, PublishResult, PublishState, TOKEN_ENV, ZenodoConfig, resolve_token};
