//! SQLite backend for the rollcall cache store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime.

mod encode;
mod live;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use live::StudentWatch;
pub use store::SqliteStore;
