//! Core types and trait definitions for the rollcall attendance cache.
//!
//! No database or filesystem code lives here. Storage backends implement
//! [`store::CacheStore`] and [`store::ArtifactStore`]; the engine
//! orchestrates them.

pub mod attendance;
pub mod biometric;
pub mod error;
pub mod lifecycle;
pub mod notification;
pub mod pid;
pub mod roster;
pub mod snapshot;
pub mod store;

pub use error::{Error, Result};
pub use pid::Pid;
