//! Roster records cached from the remote backend: villages, groups, students
//! and volunteers.
//!
//! These are local copies of remote-owned truth. Keys are assigned remotely;
//! nothing here generates identities.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::Pid;

// ─── Places and groups ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Village {
  pub village_id: i64,
  pub name:       String,
  pub district:   Option<String>,
  pub state:      Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub group_id:    i64,
  pub name:        String,
  pub description: Option<String>,
}

// ─── People ──────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Gender {
  Male,
  Female,
  Other,
  #[default]
  Unspecified,
}

impl Gender {
  /// Lenient parse for remote payloads; anything unrecognised is
  /// [`Gender::Unspecified`].
  pub fn from_remote(raw: Option<&str>) -> Self {
    raw
      .map(str::trim)
      .and_then(|s| s.parse().ok())
      .unwrap_or_default()
  }
}

/// A cached student. `village_id` and `group_id` must reference existing
/// local rows when the student is upserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub pid:                  Pid,
  pub first_name:           String,
  pub middle_name:          Option<String>,
  pub last_name:            Option<String>,
  pub birth_year:           Option<i32>,
  pub gender:               Gender,
  pub profile_pic_url:      Option<String>,
  pub school_class:         Option<String>,
  pub village_id:           i64,
  pub group_id:             i64,
  pub primary_contact_no:   Option<String>,
  pub secondary_contact_no: Option<String>,
  pub father_name:          Option<String>,
  pub mother_name:          Option<String>,
  pub is_active:            bool,
}

impl Student {
  /// Display name assembled from the name parts that are present.
  pub fn full_name(&self) -> String {
    [Some(self.first_name.as_str()), self.middle_name.as_deref(), self.last_name.as_deref()]
      .into_iter()
      .flatten()
      .filter(|part| !part.is_empty())
      .collect::<Vec<_>>()
      .join(" ")
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volunteer {
  pub pid:        Pid,
  pub first_name: String,
  pub last_name:  Option<String>,
  pub email:      Option<String>,
  pub mobile_no:  Option<String>,
  pub role:       Option<String>,
  pub village_id: Option<i64>,
  pub is_active:  bool,
}
