//! Error types for `rollcall-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid pid {0:?}: must be non-empty and usable as a file name")]
  InvalidPid(String),

  #[error("unknown {kind} discriminant: {value:?}")]
  UnknownDiscriminant { kind: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
