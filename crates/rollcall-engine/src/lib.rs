//! Orchestration over the cache and artifact stores.
//!
//! - [`SyncEngine`] merges a remote snapshot into the cache store.
//! - [`ProfileManager`] owns every multi-store change to a student identity,
//!   including the two-phase profile deletion and its recovery sweep.
//! - [`NotificationInbox`] classifies and stores inbound notifications.
//!
//! All three are generic over the [`rollcall_core::store`] traits and hold
//! shared `Arc` handles constructed once by the caller.

pub mod config;
pub mod error;
pub mod inbox;
pub mod profile;
pub mod sync;

pub use config::{InboxConfig, SyncConfig};
pub use error::{DeleteStep, Error, Family, Result};
pub use inbox::NotificationInbox;
pub use profile::{DeleteReport, ProfileManager, SweepReport};
pub use sync::{SyncEngine, SyncReport};

#[cfg(test)]
mod tests;
