//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are fixed-width RFC 3339 strings (microseconds, `Z`), so text
//! ordering matches time ordering. Enumerations are stored as their strum
//! names. Embedding vectors are little-endian `f32` blobs.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rollcall_core::{
  Pid,
  attendance::Attendance,
  biometric::{Embedding, StoredArtifact},
  lifecycle::Tombstone,
  notification::Notification,
  roster::{Student, Volunteer},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn decode_enum<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| {
    Error::Core(rollcall_core::Error::UnknownDiscriminant { kind, value: s.to_owned() })
  })
}

// ─── Vectors ─────────────────────────────────────────────────────────────────

pub fn encode_vector(v: &[f32]) -> Vec<u8> { v.iter().flat_map(|x| x.to_le_bytes()).collect() }

pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
  if bytes.len() % 4 != 0 {
    return Err(Error::Corrupt {
      column: "embeddings.vector",
      reason: format!("{} bytes is not a whole number of f32 values", bytes.len()),
    });
  }
  Ok(
    bytes
      .chunks_exact(4)
      .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
      .collect(),
  )
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawStudent::from_row`].
pub const STUDENT_COLUMNS: &str = "pid, first_name, middle_name, last_name, birth_year, gender,
  profile_pic_url, school_class, village_id, group_id, primary_contact_no,
  secondary_contact_no, father_name, mother_name, is_active";

/// Raw values read directly from a `students` row.
pub struct RawStudent {
  pub pid:                  String,
  pub first_name:           String,
  pub middle_name:          Option<String>,
  pub last_name:            Option<String>,
  pub birth_year:           Option<i32>,
  pub gender:               String,
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

impl RawStudent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      pid:                  row.get(0)?,
      first_name:           row.get(1)?,
      middle_name:          row.get(2)?,
      last_name:            row.get(3)?,
      birth_year:           row.get(4)?,
      gender:               row.get(5)?,
      profile_pic_url:      row.get(6)?,
      school_class:         row.get(7)?,
      village_id:           row.get(8)?,
      group_id:             row.get(9)?,
      primary_contact_no:   row.get(10)?,
      secondary_contact_no: row.get(11)?,
      father_name:          row.get(12)?,
      mother_name:          row.get(13)?,
      is_active:            row.get(14)?,
    })
  }

  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      pid:                  Pid::new(self.pid)?,
      first_name:           self.first_name,
      middle_name:          self.middle_name,
      last_name:            self.last_name,
      birth_year:           self.birth_year,
      gender:               decode_enum("gender", &self.gender)?,
      profile_pic_url:      self.profile_pic_url,
      school_class:         self.school_class,
      village_id:           self.village_id,
      group_id:             self.group_id,
      primary_contact_no:   self.primary_contact_no,
      secondary_contact_no: self.secondary_contact_no,
      father_name:          self.father_name,
      mother_name:          self.mother_name,
      is_active:            self.is_active,
    })
  }
}

pub const VOLUNTEER_COLUMNS: &str =
  "pid, first_name, last_name, email, mobile_no, role, village_id, is_active";

pub struct RawVolunteer {
  pub pid:        String,
  pub first_name: String,
  pub last_name:  Option<String>,
  pub email:      Option<String>,
  pub mobile_no:  Option<String>,
  pub role:       Option<String>,
  pub village_id: Option<i64>,
  pub is_active:  bool,
}

impl RawVolunteer {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      pid:        row.get(0)?,
      first_name: row.get(1)?,
      last_name:  row.get(2)?,
      email:      row.get(3)?,
      mobile_no:  row.get(4)?,
      role:       row.get(5)?,
      village_id: row.get(6)?,
      is_active:  row.get(7)?,
    })
  }

  pub fn into_volunteer(self) -> Result<Volunteer> {
    Ok(Volunteer {
      pid:        Pid::new(self.pid)?,
      first_name: self.first_name,
      last_name:  self.last_name,
      email:      self.email,
      mobile_no:  self.mobile_no,
      role:       self.role,
      village_id: self.village_id,
      is_active:  self.is_active,
    })
  }
}

pub struct RawEmbedding {
  pub embedding_id: i64,
  pub pid:          String,
  pub vector:       Vec<u8>,
  pub model:        Option<String>,
  pub created_at:   String,
}

impl RawEmbedding {
  pub fn into_embedding(self) -> Result<Embedding> {
    Ok(Embedding {
      embedding_id: self.embedding_id,
      pid:          Pid::new(self.pid)?,
      vector:       decode_vector(&self.vector)?,
      model:        self.model,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawAttendance {
  pub attendance_id: i64,
  pub pid:           String,
  pub group_id:      Option<i64>,
  pub method:        String,
  pub marked_at:     String,
}

impl RawAttendance {
  pub fn into_attendance(self) -> Result<Attendance> {
    Ok(Attendance {
      attendance_id: self.attendance_id,
      pid:           Pid::new(self.pid)?,
      group_id:      self.group_id,
      method:        decode_enum("attendance method", &self.method)?,
      marked_at:     decode_dt(&self.marked_at)?,
    })
  }
}

pub struct RawArtifact {
  pub pid:          String,
  pub kind:         String,
  pub content_hash: String,
  pub byte_len:     i64,
  pub stored_at:    String,
}

impl RawArtifact {
  pub fn into_artifact(self) -> Result<StoredArtifact> {
    Ok(StoredArtifact {
      pid:          Pid::new(self.pid)?,
      kind:         decode_enum("artifact kind", &self.kind)?,
      content_hash: self.content_hash,
      byte_len:     u64::try_from(self.byte_len).map_err(|e| Error::Corrupt {
        column: "face_artifacts.byte_len",
        reason: e.to_string(),
      })?,
      stored_at:    decode_dt(&self.stored_at)?,
    })
  }
}

pub struct RawTombstone {
  pub pid:          String,
  pub requested_at: String,
}

impl RawTombstone {
  pub fn into_tombstone(self) -> Result<Tombstone> {
    Ok(Tombstone { pid: Pid::new(self.pid)?, requested_at: decode_dt(&self.requested_at)? })
  }
}

pub const NOTIFICATION_COLUMNS: &str = "id, title, body, kind, channel_id, timestamp, is_read";

pub struct RawNotification {
  pub id:         i64,
  pub title:      String,
  pub body:       String,
  pub kind:       String,
  pub channel_id: String,
  pub timestamp:  String,
  pub is_read:    bool,
}

impl RawNotification {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      title:      row.get(1)?,
      body:       row.get(2)?,
      kind:       row.get(3)?,
      channel_id: row.get(4)?,
      timestamp:  row.get(5)?,
      is_read:    row.get(6)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      id:         self.id,
      title:      self.title,
      body:       self.body,
      kind:       decode_enum("notification kind", &self.kind)?,
      channel_id: self.channel_id,
      timestamp:  decode_dt(&self.timestamp)?,
      is_read:    self.is_read,
    })
  }
}
