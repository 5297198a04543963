//! Tombstones for two-phase student deletion.
//!
//! Deleting a profile first records a tombstone and hides the student, then
//! removes artifact files, then reaps the row. A tombstone that survives a
//! crash tells the recovery sweep which deletions to re-drive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Pid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
  pub pid:          Pid,
  pub requested_at: DateTime<Utc>,
}
