//! Error type for `rollcall-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] rollcall_core::Error),

  /// Engine failures, I/O errors and constraint violations (including
  /// foreign keys that reference missing villages or groups).
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("corrupt column {column}: {reason}")]
  Corrupt { column: &'static str, reason: String },

  #[error("store was closed")]
  Closed,
}

impl Error {
  /// True when the error is a constraint violation (foreign key, unique,
  /// check) rather than an engine or I/O failure.
  pub fn is_constraint_violation(&self) -> bool {
    matches!(
      self,
      Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)))
        if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
