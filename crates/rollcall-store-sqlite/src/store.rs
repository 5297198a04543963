//! SQLite implementation of [`CacheStore`].

use std::{path::Path, sync::Arc};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tokio::sync::watch;

use rollcall_core::{
  Pid,
  attendance::{Attendance, NewAttendance},
  biometric::{Embedding, NewEmbedding, StoredArtifact},
  lifecycle::Tombstone,
  notification::{NewNotification, Notification},
  roster::{Group, Student, Village, Volunteer},
  snapshot::LocalSnapshot,
  store::CacheStore,
};

use crate::{
  Error, Result,
  encode::{
    NOTIFICATION_COLUMNS, RawArtifact, RawAttendance, RawEmbedding, RawNotification, RawStudent,
    RawTombstone, RawVolunteer, STUDENT_COLUMNS, VOLUNTEER_COLUMNS, encode_dt, encode_vector,
  },
  live::{Live, StudentWatch},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A rollcall cache store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection and live channels are
/// reference-counted. Construct one per process and share clones.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  live: Arc<Live>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let store = Self { conn, live: Arc::new(Live::new()) };
    store
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    store.publish_notifications().await?;
    Ok(store)
  }

  /// A live view of the student with `pid`.
  pub fn watch_student(&self, pid: Pid) -> StudentWatch { StudentWatch::new(self.clone(), pid) }

  /// Re-read the notification list and unread count and push both to
  /// subscribers.
  async fn publish_notifications(&self) -> Result<()> {
    let _publishing = self.live.publish.lock().await;
    let (raws, unread): (Vec<RawNotification>, i64) = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications ORDER BY timestamp DESC, id DESC"
        ))?;
        let raws = stmt
          .query_map([], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        let unread =
          conn.query_row("SELECT COUNT(*) FROM notifications WHERE is_read = 0", [], |r| r.get(0))?;
        Ok((raws, unread))
      })
      .await?;

    let list = raws
      .into_iter()
      .map(RawNotification::into_notification)
      .collect::<Result<Vec<_>>>()?;

    self.live.notifications.send_replace(Arc::new(list));
    self.live.unread.send_replace(unread.max(0) as u64);
    Ok(())
  }

  /// The write already committed; a failed republish only delays
  /// subscribers until the next write.
  async fn after_notification_write(&self) {
    if let Err(e) = self.publish_notifications().await {
      tracing::warn!(error = %e, "failed to republish notifications");
    }
  }

  async fn exists<K>(&self, sql: &'static str, key: K) -> Result<bool>
  where
    K: rusqlite::ToSql + Send + 'static,
  {
    Ok(
      self
        .conn
        .call(move |conn| Ok(conn.query_row(sql, rusqlite::params![key], |r| r.get(0))?))
        .await?,
    )
  }

  async fn execute_keyed<K>(&self, sql: &'static str, key: K) -> Result<usize>
  where
    K: rusqlite::ToSql + Send + 'static,
  {
    Ok(
      self
        .conn
        .call(move |conn| Ok(conn.execute(sql, rusqlite::params![key])?))
        .await?,
    )
  }
}

// ─── Row writers ─────────────────────────────────────────────────────────────
//
// Shared by the single-row upserts and the snapshot transaction. All use
// `ON CONFLICT DO UPDATE` rather than `INSERT OR REPLACE`, which would delete
// the old row first and trip foreign keys pointing at it.

fn upsert_village_row(conn: &rusqlite::Connection, v: &Village) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO villages (village_id, name, district, state)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(village_id) DO UPDATE SET
       name = excluded.name, district = excluded.district, state = excluded.state",
    rusqlite::params![v.village_id, v.name, v.district, v.state],
  )?;
  Ok(())
}

fn upsert_group_row(conn: &rusqlite::Connection, g: &Group) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO student_groups (group_id, name, description)
     VALUES (?1, ?2, ?3)
     ON CONFLICT(group_id) DO UPDATE SET
       name = excluded.name, description = excluded.description",
    rusqlite::params![g.group_id, g.name, g.description],
  )?;
  Ok(())
}

/// Also clears `deleted_at`: upserting a tombstoned student revives it.
fn upsert_student_row(conn: &rusqlite::Connection, s: &Student) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO students (
       pid, first_name, middle_name, last_name, birth_year, gender,
       profile_pic_url, school_class, village_id, group_id, primary_contact_no,
       secondary_contact_no, father_name, mother_name, is_active, deleted_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, NULL)
     ON CONFLICT(pid) DO UPDATE SET
       first_name           = excluded.first_name,
       middle_name          = excluded.middle_name,
       last_name            = excluded.last_name,
       birth_year           = excluded.birth_year,
       gender               = excluded.gender,
       profile_pic_url      = excluded.profile_pic_url,
       school_class         = excluded.school_class,
       village_id           = excluded.village_id,
       group_id             = excluded.group_id,
       primary_contact_no   = excluded.primary_contact_no,
       secondary_contact_no = excluded.secondary_contact_no,
       father_name          = excluded.father_name,
       mother_name          = excluded.mother_name,
       is_active            = excluded.is_active,
       deleted_at           = NULL",
    rusqlite::params![
      s.pid.as_str(),
      s.first_name,
      s.middle_name,
      s.last_name,
      s.birth_year,
      s.gender.as_ref(),
      s.profile_pic_url,
      s.school_class,
      s.village_id,
      s.group_id,
      s.primary_contact_no,
      s.secondary_contact_no,
      s.father_name,
      s.mother_name,
      s.is_active,
    ],
  )?;
  Ok(())
}

fn upsert_volunteer_row(conn: &rusqlite::Connection, v: &Volunteer) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO volunteers (
       pid, first_name, last_name, email, mobile_no, role, village_id, is_active
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT(pid) DO UPDATE SET
       first_name = excluded.first_name,
       last_name  = excluded.last_name,
       email      = excluded.email,
       mobile_no  = excluded.mobile_no,
       role       = excluded.role,
       village_id = excluded.village_id,
       is_active  = excluded.is_active",
    rusqlite::params![
      v.pid.as_str(),
      v.first_name,
      v.last_name,
      v.email,
      v.mobile_no,
      v.role,
      v.village_id,
      v.is_active,
    ],
  )?;
  Ok(())
}

fn village_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Village> {
  Ok(Village {
    village_id: row.get(0)?,
    name:       row.get(1)?,
    district:   row.get(2)?,
    state:      row.get(3)?,
  })
}

fn group_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
  Ok(Group { group_id: row.get(0)?, name: row.get(1)?, description: row.get(2)? })
}

// ─── CacheStore impl ─────────────────────────────────────────────────────────

impl CacheStore for SqliteStore {
  type Error = Error;

  // ── Villages ──────────────────────────────────────────────────────────────

  async fn upsert_village(&self, village: Village) -> Result<()> {
    self.conn.call(move |conn| Ok(upsert_village_row(conn, &village)?)).await?;
    Ok(())
  }

  async fn get_village(&self, village_id: i64) -> Result<Option<Village>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT village_id, name, district, state FROM villages WHERE village_id = ?1",
                rusqlite::params![village_id],
                village_from_row,
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  async fn village_exists(&self, village_id: i64) -> Result<bool> {
    self
      .exists("SELECT EXISTS(SELECT 1 FROM villages WHERE village_id = ?1)", village_id)
      .await
  }

  async fn delete_village(&self, village_id: i64) -> Result<()> {
    self.execute_keyed("DELETE FROM villages WHERE village_id = ?1", village_id).await?;
    Ok(())
  }

  async fn list_villages(&self) -> Result<Vec<Village>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt = conn
            .prepare("SELECT village_id, name, district, state FROM villages ORDER BY village_id")?;
          Ok(stmt.query_map([], village_from_row)?.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await?,
    )
  }

  // ── Groups ────────────────────────────────────────────────────────────────

  async fn upsert_group(&self, group: Group) -> Result<()> {
    self.conn.call(move |conn| Ok(upsert_group_row(conn, &group)?)).await?;
    Ok(())
  }

  async fn get_group(&self, group_id: i64) -> Result<Option<Group>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT group_id, name, description FROM student_groups WHERE group_id = ?1",
                rusqlite::params![group_id],
                group_from_row,
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  async fn group_exists(&self, group_id: i64) -> Result<bool> {
    self
      .exists("SELECT EXISTS(SELECT 1 FROM student_groups WHERE group_id = ?1)", group_id)
      .await
  }

  async fn delete_group(&self, group_id: i64) -> Result<()> {
    self.execute_keyed("DELETE FROM student_groups WHERE group_id = ?1", group_id).await?;
    Ok(())
  }

  async fn list_groups(&self) -> Result<Vec<Group>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt = conn
            .prepare("SELECT group_id, name, description FROM student_groups ORDER BY group_id")?;
          Ok(stmt.query_map([], group_from_row)?.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await?,
    )
  }

  // ── Students ──────────────────────────────────────────────────────────────

  async fn upsert_student(&self, student: Student) -> Result<()> {
    self.conn.call(move |conn| Ok(upsert_student_row(conn, &student)?)).await?;
    self.live.bump_students();
    Ok(())
  }

  async fn get_student(&self, pid: Pid) -> Result<Option<Student>> {
    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {STUDENT_COLUMNS} FROM students WHERE pid = ?1 AND deleted_at IS NULL"
              ),
              rusqlite::params![pid.as_str()],
              RawStudent::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStudent::into_student).transpose()
  }

  async fn student_exists(&self, pid: Pid) -> Result<bool> {
    self
      .exists(
        "SELECT EXISTS(SELECT 1 FROM students WHERE pid = ?1 AND deleted_at IS NULL)",
        String::from(pid),
      )
      .await
  }

  async fn delete_student(&self, pid: Pid) -> Result<()> {
    self.execute_keyed("DELETE FROM students WHERE pid = ?1", String::from(pid)).await?;
    self.live.bump_students();
    Ok(())
  }

  async fn list_students(&self) -> Result<Vec<Student>> {
    let raws: Vec<RawStudent> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STUDENT_COLUMNS} FROM students WHERE deleted_at IS NULL ORDER BY pid"
        ))?;
        Ok(stmt.query_map([], RawStudent::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?)
      })
      .await?;

    raws.into_iter().map(RawStudent::into_student).collect()
  }

  async fn list_student_pids(&self) -> Result<Vec<Pid>> {
    let raws: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT pid FROM students WHERE deleted_at IS NULL ORDER BY pid")?;
        Ok(stmt.query_map([], |r| r.get(0))?.collect::<rusqlite::Result<Vec<_>>>()?)
      })
      .await?;

    Ok(raws.into_iter().map(Pid::new).collect::<rollcall_core::Result<_>>()?)
  }

  // ── Volunteers ────────────────────────────────────────────────────────────

  async fn upsert_volunteer(&self, volunteer: Volunteer) -> Result<()> {
    self.conn.call(move |conn| Ok(upsert_volunteer_row(conn, &volunteer)?)).await?;
    Ok(())
  }

  async fn get_volunteer(&self, pid: Pid) -> Result<Option<Volunteer>> {
    let raw: Option<RawVolunteer> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {VOLUNTEER_COLUMNS} FROM volunteers WHERE pid = ?1"),
              rusqlite::params![pid.as_str()],
              RawVolunteer::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVolunteer::into_volunteer).transpose()
  }

  async fn volunteer_exists(&self, pid: Pid) -> Result<bool> {
    self
      .exists("SELECT EXISTS(SELECT 1 FROM volunteers WHERE pid = ?1)", String::from(pid))
      .await
  }

  async fn delete_volunteer(&self, pid: Pid) -> Result<()> {
    self.execute_keyed("DELETE FROM volunteers WHERE pid = ?1", String::from(pid)).await?;
    Ok(())
  }

  async fn list_volunteers(&self) -> Result<Vec<Volunteer>> {
    let raws: Vec<RawVolunteer> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {VOLUNTEER_COLUMNS} FROM volunteers ORDER BY pid"))?;
        Ok(stmt.query_map([], RawVolunteer::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?)
      })
      .await?;

    raws.into_iter().map(RawVolunteer::into_volunteer).collect()
  }

  // ── Snapshot batch ────────────────────────────────────────────────────────

  async fn apply_snapshot(&self, snapshot: LocalSnapshot) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for village in &snapshot.villages {
          upsert_village_row(&tx, village)?;
        }
        for group in &snapshot.groups {
          upsert_group_row(&tx, group)?;
        }
        for student in &snapshot.students {
          upsert_student_row(&tx, student)?;
        }
        for volunteer in &snapshot.volunteers {
          upsert_volunteer_row(&tx, volunteer)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    self.live.bump_students();
    Ok(())
  }

  // ── Embeddings ────────────────────────────────────────────────────────────

  async fn add_embedding(&self, input: NewEmbedding) -> Result<Embedding> {
    let created_at = Utc::now();
    let pid_str = input.pid.to_string();
    let blob = encode_vector(&input.vector);
    let model = input.model.clone();
    let at_str = encode_dt(created_at);

    let embedding_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO embeddings (pid, vector, model, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![pid_str, blob, model, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Embedding {
      embedding_id,
      pid: input.pid,
      vector: input.vector,
      model: input.model,
      created_at,
    })
  }

  async fn get_embeddings(&self, pid: Pid) -> Result<Vec<Embedding>> {
    let raws: Vec<RawEmbedding> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT embedding_id, pid, vector, model, created_at
           FROM embeddings WHERE pid = ?1 ORDER BY embedding_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![pid.as_str()], |row| {
            Ok(RawEmbedding {
              embedding_id: row.get(0)?,
              pid:          row.get(1)?,
              vector:       row.get(2)?,
              model:        row.get(3)?,
              created_at:   row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEmbedding::into_embedding).collect()
  }

  async fn delete_embeddings(&self, pid: Pid) -> Result<usize> {
    self.execute_keyed("DELETE FROM embeddings WHERE pid = ?1", String::from(pid)).await
  }

  // ── Attendance ────────────────────────────────────────────────────────────

  async fn record_attendance(&self, input: NewAttendance) -> Result<Attendance> {
    let marked_at = input.marked_at.unwrap_or_else(Utc::now);
    let pid_str = input.pid.to_string();
    let method_str = input.method.as_ref().to_owned();
    let at_str = encode_dt(marked_at);
    let group_id = input.group_id;

    let attendance_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO attendance (pid, group_id, method, marked_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![pid_str, group_id, method_str, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Attendance {
      attendance_id,
      pid: input.pid,
      group_id: input.group_id,
      method: input.method,
      marked_at,
    })
  }

  async fn list_attendance(&self, pid: Pid) -> Result<Vec<Attendance>> {
    let raws: Vec<RawAttendance> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT attendance_id, pid, group_id, method, marked_at
           FROM attendance WHERE pid = ?1 ORDER BY marked_at, attendance_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![pid.as_str()], |row| {
            Ok(RawAttendance {
              attendance_id: row.get(0)?,
              pid:           row.get(1)?,
              group_id:      row.get(2)?,
              method:        row.get(3)?,
              marked_at:     row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttendance::into_attendance).collect()
  }

  // ── Face artifact index ───────────────────────────────────────────────────

  /// Rows are stored under `pid` regardless of the pid carried in each
  /// record.
  async fn record_face_artifacts(&self, pid: Pid, records: Vec<StoredArtifact>) -> Result<()> {
    let pid_str = pid.to_string();
    let rows = records
      .iter()
      .map(|r| {
        let byte_len = i64::try_from(r.byte_len).map_err(|e| Error::Corrupt {
          column: "face_artifacts.byte_len",
          reason: e.to_string(),
        })?;
        Ok((r.kind.as_ref().to_owned(), r.content_hash.clone(), byte_len, encode_dt(r.stored_at)))
      })
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM face_artifacts WHERE pid = ?1", rusqlite::params![pid_str])?;
        for (kind, hash, byte_len, stored_at) in &rows {
          tx.execute(
            "INSERT INTO face_artifacts (pid, kind, content_hash, byte_len, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![pid_str, kind, hash, byte_len, stored_at],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_face_artifacts(&self, pid: Pid) -> Result<Vec<StoredArtifact>> {
    let raws: Vec<RawArtifact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT pid, kind, content_hash, byte_len, stored_at
           FROM face_artifacts WHERE pid = ?1 ORDER BY kind",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![pid.as_str()], |row| {
            Ok(RawArtifact {
              pid:          row.get(0)?,
              kind:         row.get(1)?,
              content_hash: row.get(2)?,
              byte_len:     row.get(3)?,
              stored_at:    row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawArtifact::into_artifact).collect()
  }

  async fn delete_face_artifacts(&self, pid: Pid) -> Result<()> {
    self.execute_keyed("DELETE FROM face_artifacts WHERE pid = ?1", String::from(pid)).await?;
    Ok(())
  }

  // ── Two-phase deletion ────────────────────────────────────────────────────

  async fn tombstone_student(&self, pid: Pid) -> Result<Tombstone> {
    let pid_str = pid.to_string();
    let now_str = encode_dt(Utc::now());

    let raw: RawTombstone = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // Keep the first request time when a deletion is re-driven.
        tx.execute(
          "INSERT INTO student_tombstones (pid, requested_at) VALUES (?1, ?2)
           ON CONFLICT(pid) DO NOTHING",
          rusqlite::params![pid_str, now_str],
        )?;
        tx.execute(
          "UPDATE students SET deleted_at = ?2 WHERE pid = ?1 AND deleted_at IS NULL",
          rusqlite::params![pid_str, now_str],
        )?;
        tx.execute("DELETE FROM embeddings WHERE pid = ?1", rusqlite::params![pid_str])?;
        // The files are about to go; the index must not outlive them.
        tx.execute("DELETE FROM face_artifacts WHERE pid = ?1", rusqlite::params![pid_str])?;
        let raw = tx.query_row(
          "SELECT pid, requested_at FROM student_tombstones WHERE pid = ?1",
          rusqlite::params![pid_str],
          |row| Ok(RawTombstone { pid: row.get(0)?, requested_at: row.get(1)? }),
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    self.live.bump_students();
    raw.into_tombstone()
  }

  async fn pending_tombstones(&self) -> Result<Vec<Tombstone>> {
    let raws: Vec<RawTombstone> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare("SELECT pid, requested_at FROM student_tombstones ORDER BY requested_at, pid")?;
        let rows = stmt
          .query_map([], |row| Ok(RawTombstone { pid: row.get(0)?, requested_at: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTombstone::into_tombstone).collect()
  }

  async fn reap_student(&self, pid: Pid) -> Result<()> {
    let pid_str = pid.to_string();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM students WHERE pid = ?1 AND deleted_at IS NOT NULL",
          rusqlite::params![pid_str],
        )?;
        // A student revived and re-captured since the tombstone keeps its
        // new index.
        tx.execute(
          "DELETE FROM face_artifacts WHERE pid = ?1
             AND NOT EXISTS (SELECT 1 FROM students WHERE pid = ?1)",
          rusqlite::params![pid_str],
        )?;
        tx.execute("DELETE FROM student_tombstones WHERE pid = ?1", rusqlite::params![pid_str])?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    self.live.bump_students();
    Ok(())
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn insert_notification(
    &self,
    input: NewNotification,
    dedup_key: Option<String>,
  ) -> Result<Option<Notification>> {
    let title = input.title.clone();
    let body = input.body.clone();
    let kind_str = input.kind.as_ref().to_owned();
    let channel_id = input.channel_id.clone();
    let at_str = encode_dt(input.timestamp);

    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO notifications (title, body, kind, channel_id, timestamp, is_read, dedup_key)
           VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
           ON CONFLICT(dedup_key) DO NOTHING",
          rusqlite::params![title, body, kind_str, channel_id, at_str, dedup_key],
        )?;
        Ok((inserted > 0).then(|| conn.last_insert_rowid()))
      })
      .await?;

    let Some(id) = id else {
      return Ok(None);
    };

    self.after_notification_write().await;

    Ok(Some(Notification {
      id,
      title: input.title,
      body: input.body,
      kind: input.kind,
      channel_id: input.channel_id,
      timestamp: input.timestamp,
      is_read: false,
    }))
  }

  async fn get_notification(&self, id: i64) -> Result<Option<Notification>> {
    let raw: Option<RawNotification> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
              rusqlite::params![id],
              RawNotification::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawNotification::into_notification).transpose()
  }

  async fn mark_read(&self, id: i64) -> Result<()> {
    let changed = self
      .execute_keyed("UPDATE notifications SET is_read = 1 WHERE id = ?1 AND is_read = 0", id)
      .await?;
    if changed > 0 {
      self.after_notification_write().await;
    }
    Ok(())
  }

  async fn mark_all_read(&self) -> Result<usize> {
    let changed = self
      .conn
      .call(|conn| Ok(conn.execute("UPDATE notifications SET is_read = 1 WHERE is_read = 0", [])?))
      .await?;
    if changed > 0 {
      self.after_notification_write().await;
    }
    Ok(changed)
  }

  async fn unread_count(&self) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM notifications WHERE is_read = 0", [], |r| {
          r.get(0)
        })?)
      })
      .await?;
    Ok(count.max(0) as u64)
  }

  async fn list_notifications(&self) -> Result<Vec<Notification>> {
    let raws: Vec<RawNotification> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications ORDER BY timestamp DESC, id DESC"
        ))?;
        Ok(stmt.query_map([], RawNotification::from_row)?.collect::<rusqlite::Result<Vec<_>>>()?)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn delete_notification(&self, id: i64) -> Result<()> {
    let changed = self.execute_keyed("DELETE FROM notifications WHERE id = ?1", id).await?;
    if changed > 0 {
      self.after_notification_write().await;
    }
    Ok(())
  }

  async fn delete_all_notifications(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute("DELETE FROM notifications", [])?;
        Ok(())
      })
      .await?;
    self.after_notification_write().await;
    Ok(())
  }

  // ── Live reads ────────────────────────────────────────────────────────────

  fn subscribe_unread_count(&self) -> watch::Receiver<u64> { self.live.unread.subscribe() }

  fn subscribe_notifications(&self) -> watch::Receiver<Arc<Vec<Notification>>> {
    self.live.notifications.subscribe()
  }

  fn subscribe_students(&self) -> watch::Receiver<u64> { self.live.students.subscribe() }
}
