//! The `CacheStore` and `ArtifactStore` traits.
//!
//! `CacheStore` is implemented by structured storage backends (e.g.
//! `rollcall-store-sqlite`); `ArtifactStore` by binary file backends (e.g.
//! `rollcall-artifacts`). The engine depends on these abstractions, never on
//! a concrete backend, and is the only caller that coordinates both.

use std::{future::Future, sync::Arc};

use tokio::sync::watch;

use crate::{
  Pid,
  attendance::{Attendance, NewAttendance},
  biometric::{ArtifactKind, Embedding, NewEmbedding, StoredArtifact},
  lifecycle::Tombstone,
  notification::{NewNotification, Notification},
  roster::{Group, Student, Village, Volunteer},
  snapshot::LocalSnapshot,
};

// ─── Structured store ────────────────────────────────────────────────────────

/// Durable keyed storage for every cached record family.
///
/// Upserts insert or replace by key and are idempotent. Deleting an absent
/// key is a no-op. Point lookups return `None` for absence, never an error.
/// Each call is atomic; operations documented as transactional group several
/// statements into one commit.
///
/// All methods return `Send` futures so the trait can be shared across a
/// multi-threaded runtime.
pub trait CacheStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Villages ──────────────────────────────────────────────────────────

  fn upsert_village(
    &self,
    village: Village,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_village(
    &self,
    village_id: i64,
  ) -> impl Future<Output = Result<Option<Village>, Self::Error>> + Send + '_;

  fn village_exists(
    &self,
    village_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn delete_village(
    &self,
    village_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_villages(&self) -> impl Future<Output = Result<Vec<Village>, Self::Error>> + Send + '_;

  // ── Groups ────────────────────────────────────────────────────────────

  fn upsert_group(&self, group: Group) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_group(
    &self,
    group_id: i64,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + '_;

  fn group_exists(
    &self,
    group_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn delete_group(
    &self,
    group_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_groups(&self) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + '_;

  // ── Students ──────────────────────────────────────────────────────────

  /// Insert or replace a student. Fails if `village_id` or `group_id` does
  /// not reference an existing row. Upserting a tombstoned pid makes the
  /// student visible again.
  fn upsert_student(
    &self,
    student: Student,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Point lookup; tombstoned students are not returned.
  fn get_student(
    &self,
    pid: Pid,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + '_;

  /// Dedicated existence query; does not load the row.
  fn student_exists(&self, pid: Pid)
  -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Hard-delete the student row only. Embeddings and artifacts are left to
  /// the caller; profile deletion goes through the tombstone operations.
  fn delete_student(&self, pid: Pid) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_students(&self) -> impl Future<Output = Result<Vec<Student>, Self::Error>> + Send + '_;

  fn list_student_pids(&self) -> impl Future<Output = Result<Vec<Pid>, Self::Error>> + Send + '_;

  // ── Volunteers ────────────────────────────────────────────────────────

  fn upsert_volunteer(
    &self,
    volunteer: Volunteer,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_volunteer(
    &self,
    pid: Pid,
  ) -> impl Future<Output = Result<Option<Volunteer>, Self::Error>> + Send + '_;

  fn volunteer_exists(
    &self,
    pid: Pid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn delete_volunteer(
    &self,
    pid: Pid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_volunteers(
    &self,
  ) -> impl Future<Output = Result<Vec<Volunteer>, Self::Error>> + Send + '_;

  // ── Snapshot batch ────────────────────────────────────────────────────

  /// Upsert every row of `snapshot` in dependency order (villages, groups,
  /// students, volunteers) inside a single transaction.
  fn apply_snapshot(
    &self,
    snapshot: LocalSnapshot,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Embeddings ────────────────────────────────────────────────────────

  fn add_embedding(
    &self,
    input: NewEmbedding,
  ) -> impl Future<Output = Result<Embedding, Self::Error>> + Send + '_;

  fn get_embeddings(
    &self,
    pid: Pid,
  ) -> impl Future<Output = Result<Vec<Embedding>, Self::Error>> + Send + '_;

  /// Returns the number of rows removed.
  fn delete_embeddings(
    &self,
    pid: Pid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Attendance (append-only) ──────────────────────────────────────────

  fn record_attendance(
    &self,
    input: NewAttendance,
  ) -> impl Future<Output = Result<Attendance, Self::Error>> + Send + '_;

  fn list_attendance(
    &self,
    pid: Pid,
  ) -> impl Future<Output = Result<Vec<Attendance>, Self::Error>> + Send + '_;

  // ── Face artifact index ───────────────────────────────────────────────

  /// Replace the index rows for `pid` with `records` in one transaction.
  fn record_face_artifacts(
    &self,
    pid: Pid,
    records: Vec<StoredArtifact>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_face_artifacts(
    &self,
    pid: Pid,
  ) -> impl Future<Output = Result<Vec<StoredArtifact>, Self::Error>> + Send + '_;

  fn delete_face_artifacts(
    &self,
    pid: Pid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Two-phase deletion ────────────────────────────────────────────────

  /// Phase one, one transaction: record a tombstone, hide the student row,
  /// delete its embeddings and artifact index rows. Safe to call for a pid
  /// with no row.
  fn tombstone_student(
    &self,
    pid: Pid,
  ) -> impl Future<Output = Result<Tombstone, Self::Error>> + Send + '_;

  fn pending_tombstones(
    &self,
  ) -> impl Future<Output = Result<Vec<Tombstone>, Self::Error>> + Send + '_;

  /// Phase two, one transaction: hard-delete the student row if it is still
  /// hidden, drop its artifact index rows, clear the tombstone. A student
  /// revived by an upsert since the tombstone keeps its row and any index
  /// written after the revival.
  fn reap_student(&self, pid: Pid) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Store a classified notification. With a `dedup_key` that is already
  /// present, nothing is stored and `None` is returned.
  fn insert_notification(
    &self,
    input: NewNotification,
    dedup_key: Option<String>,
  ) -> impl Future<Output = Result<Option<Notification>, Self::Error>> + Send + '_;

  fn get_notification(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Notification>, Self::Error>> + Send + '_;

  fn mark_read(&self, id: i64) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Returns the number of notifications that changed state.
  fn mark_all_read(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn unread_count(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Most recent first.
  fn list_notifications(
    &self,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  fn delete_notification(&self, id: i64)
  -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_all_notifications(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Live reads ────────────────────────────────────────────────────────

  /// Unread count, republished after every notification write.
  fn subscribe_unread_count(&self) -> watch::Receiver<u64>;

  /// Notification list (most recent first), republished after every
  /// notification write.
  fn subscribe_notifications(&self) -> watch::Receiver<Arc<Vec<Notification>>>;

  /// Revision counter bumped after every student write.
  fn subscribe_students(&self) -> watch::Receiver<u64>;
}

// ─── Artifact store ──────────────────────────────────────────────────────────

/// Binary storage for face artifacts, keyed by pid and [`ArtifactKind`].
///
/// File names are derived with
/// [`artifact_file_name`](crate::biometric::artifact_file_name). Deleting an
/// absent file is not an error.
pub trait ArtifactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Write (or overwrite) an artifact. Readers never observe a partially
  /// written file.
  fn write(
    &self,
    pid: Pid,
    kind: ArtifactKind,
    bytes: Vec<u8>,
  ) -> impl Future<Output = Result<StoredArtifact, Self::Error>> + Send + '_;

  fn read(
    &self,
    pid: Pid,
    kind: ArtifactKind,
  ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send + '_;

  fn exists(
    &self,
    pid: Pid,
    kind: ArtifactKind,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Returns `true` if a file was removed.
  fn delete(
    &self,
    pid: Pid,
    kind: ArtifactKind,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Every pid with at least one artifact file present.
  fn list_pids(&self) -> impl Future<Output = Result<Vec<Pid>, Self::Error>> + Send + '_;
}
