//! Remote snapshot shapes and their 1:1 mapping onto local rows.
//!
//! A snapshot is one complete bundle of remote records for the current sync
//! scope. Field names follow the backend's camelCase JSON.

use serde::{Deserialize, Serialize};

use crate::{
  Pid,
  roster::{Gender, Group, Student, Village, Volunteer},
};

// ─── Remote representations ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVillage {
  pub id:       i64,
  pub name:     String,
  #[serde(default)]
  pub district: Option<String>,
  #[serde(default)]
  pub state:    Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteGroup {
  pub id:          i64,
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStudent {
  pub pid:                  Pid,
  pub first_name:           String,
  #[serde(default)]
  pub middle_name:          Option<String>,
  #[serde(default)]
  pub last_name:            Option<String>,
  #[serde(default)]
  pub year_of_birth:        Option<i32>,
  #[serde(default)]
  pub gender:               Option<String>,
  #[serde(default)]
  pub profile_pic_url:      Option<String>,
  #[serde(default)]
  pub school_class:         Option<String>,
  pub village_id:           i64,
  pub group_id:             i64,
  #[serde(default)]
  pub primary_contact_no:   Option<String>,
  #[serde(default)]
  pub secondary_contact_no: Option<String>,
  #[serde(default)]
  pub fathers_name:         Option<String>,
  #[serde(default)]
  pub mothers_name:         Option<String>,
  #[serde(default = "default_active")]
  pub is_active:            bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVolunteer {
  pub pid:        Pid,
  pub first_name: String,
  #[serde(default)]
  pub last_name:  Option<String>,
  #[serde(default)]
  pub email:      Option<String>,
  #[serde(default)]
  pub mobile_no:  Option<String>,
  #[serde(default)]
  pub role:       Option<String>,
  #[serde(default)]
  pub village_id: Option<i64>,
  #[serde(default = "default_active")]
  pub is_active:  bool,
}

fn default_active() -> bool { true }

/// One complete bundle of remote records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnapshot {
  #[serde(default)]
  pub villages:   Vec<RemoteVillage>,
  #[serde(default)]
  pub groups:     Vec<RemoteGroup>,
  #[serde(default)]
  pub students:   Vec<RemoteStudent>,
  #[serde(default)]
  pub volunteers: Vec<RemoteVolunteer>,
}

// ─── Mapping ─────────────────────────────────────────────────────────────────

impl From<RemoteVillage> for Village {
  fn from(r: RemoteVillage) -> Self {
    Village { village_id: r.id, name: r.name, district: r.district, state: r.state }
  }
}

impl From<RemoteGroup> for Group {
  fn from(r: RemoteGroup) -> Self {
    Group { group_id: r.id, name: r.name, description: r.description }
  }
}

impl From<RemoteStudent> for Student {
  fn from(r: RemoteStudent) -> Self {
    Student {
      gender:               Gender::from_remote(r.gender.as_deref()),
      pid:                  r.pid,
      first_name:           r.first_name,
      middle_name:          r.middle_name,
      last_name:            r.last_name,
      birth_year:           r.year_of_birth,
      profile_pic_url:      r.profile_pic_url,
      school_class:         r.school_class,
      village_id:           r.village_id,
      group_id:             r.group_id,
      primary_contact_no:   r.primary_contact_no,
      secondary_contact_no: r.secondary_contact_no,
      father_name:          r.fathers_name,
      mother_name:          r.mothers_name,
      is_active:            r.is_active,
    }
  }
}

impl From<RemoteVolunteer> for Volunteer {
  fn from(r: RemoteVolunteer) -> Self {
    Volunteer {
      pid:        r.pid,
      first_name: r.first_name,
      last_name:  r.last_name,
      email:      r.email,
      mobile_no:  r.mobile_no,
      role:       r.role,
      village_id: r.village_id,
      is_active:  r.is_active,
    }
  }
}

/// A snapshot converted to local row shapes, ready to upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSnapshot {
  pub villages:   Vec<Village>,
  pub groups:     Vec<Group>,
  pub students:   Vec<Student>,
  pub volunteers: Vec<Volunteer>,
}

impl From<RemoteSnapshot> for LocalSnapshot {
  fn from(r: RemoteSnapshot) -> Self {
    LocalSnapshot {
      villages:   r.villages.into_iter().map(Into::into).collect(),
      groups:     r.groups.into_iter().map(Into::into).collect(),
      students:   r.students.into_iter().map(Into::into).collect(),
      volunteers: r.volunteers.into_iter().map(Into::into).collect(),
    }
  }
}
