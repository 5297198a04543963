//! Attendance: append-only presence records.
//!
//! Attendance rows reference a pid but are never touched by profile
//! lifecycle operations; history outlives the profile it refers to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::Pid;

/// How the presence was established.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceMethod {
  /// Matched on-device against stored embeddings.
  Face,
  #[default]
  Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendance {
  pub attendance_id: i64,
  pub pid:           Pid,
  pub group_id:      Option<i64>,
  pub method:        AttendanceMethod,
  pub marked_at:     DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendance {
  pub pid:       Pid,
  pub group_id:  Option<i64>,
  pub method:    AttendanceMethod,
  /// Defaults to the time of insertion.
  pub marked_at: Option<DateTime<Utc>>,
}
