//! Error taxonomy for the engine.
//!
//! Point lookups never fail for absence; they return `Option`. Multi-step
//! operations report which step or record family failed and what had
//! already been committed.

use rollcall_core::Pid;
use strum::Display;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A record family within a snapshot, in sync order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Family {
  Village,
  Group,
  Student,
  Volunteer,
}

/// The stages of a profile deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeleteStep {
  /// Hide the student, drop embeddings, record the tombstone.
  Tombstone,
  /// Remove the artifact files.
  Artifacts,
  /// Remove the row, the artifact index and the tombstone.
  Reap,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("storage error: {0}")]
  Storage(#[source] BoxError),

  #[error("artifact i/o error: {0}")]
  ArtifactIo(#[source] BoxError),

  #[error("student not found: {0}")]
  StudentNotFound(Pid),

  #[error(
    "sync failed upserting {family} rows after {upserted} succeeded \
     (already committed: {committed:?}): {source}"
  )]
  SyncPartial {
    family:    Family,
    upserted:  usize,
    committed: Vec<Family>,
    #[source]
    source:    BoxError,
  },

  /// Re-invoking the deletion (or running the sweep) completes it.
  #[error("deleting profile {pid} failed at step {step}: {source}")]
  DeleteFailed {
    pid:    Pid,
    step:   DeleteStep,
    #[source]
    source: Box<Error>,
  },
}

impl Error {
  pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Error::Storage(Box::new(e))
  }

  pub fn artifact(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Error::ArtifactIo(Box::new(e))
  }

  pub(crate) fn at_step(pid: &Pid, step: DeleteStep) -> impl FnOnce(Error) -> Self {
    let pid = pid.clone();
    move |source| Error::DeleteFailed { pid, step, source: Box::new(source) }
  }

  /// Storage failures are treated as transient by retrying callers.
  pub fn is_storage(&self) -> bool { matches!(self, Error::Storage(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
