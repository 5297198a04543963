//! Engine tests over a real SQLite cache and a temporary artifact directory.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rollcall_artifacts::FsArtifactStore;
use rollcall_core::{
  Pid,
  attendance::{AttendanceMethod, NewAttendance},
  biometric::{ArtifactKind, ArtifactPresence, FaceCapture},
  notification::{IncomingNotification, NotificationKind},
  snapshot::RemoteSnapshot,
  store::{ArtifactStore, CacheStore},
};
use rollcall_store_sqlite::SqliteStore;
use serde_json::json;
use tempfile::TempDir;

use crate::{
  DeleteStep, Error, Family, InboxConfig, NotificationInbox, ProfileManager, SweepReport,
  SyncConfig, SyncEngine,
};


use flaky::FlakyStore;

struct Fixture {
  store:     Arc<SqliteStore>,
  artifacts: Arc<FsArtifactStore>,
  _dir:      TempDir,
}

impl Fixture {
  async fn new() -> Self {
    let dir = TempDir::new().unwrap();
    let artifacts = FsArtifactStore::open(dir.path().join("faces")).await.unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();
    Self { store: Arc::new(store), artifacts: Arc::new(artifacts), _dir: dir }
  }

  fn sync(&self) -> SyncEngine<SqliteStore> {
    SyncEngine::new(self.store.clone(), SyncConfig::default())
  }

  fn atomic_sync(&self) -> SyncEngine<SqliteStore> {
    SyncEngine::new(self.store.clone(), SyncConfig { atomic: true })
  }

  fn profiles(&self) -> ProfileManager<SqliteStore, FsArtifactStore> {
    ProfileManager::new(self.store.clone(), self.artifacts.clone())
  }

  fn inbox(&self, config: InboxConfig) -> NotificationInbox<SqliteStore> {
    NotificationInbox::new(self.store.clone(), config)
  }

  /// Put a non-empty directory where an artifact file belongs, so writing
  /// or removing that file fails.
  fn block_artifact(&self, p: &str, kind: ArtifactKind) {
    let path = self.artifacts.path_for(&pid(p), kind);
    if path.is_file() {
      std::fs::remove_file(&path).unwrap();
    }
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("stuck"), b"x").unwrap();
  }

  fn unblock_artifact(&self, p: &str, kind: ArtifactKind) {
    std::fs::remove_dir_all(self.artifacts.path_for(&pid(p), kind)).unwrap();
  }
}

async fn flaky_store() -> Arc<FlakyStore> {
  Arc::new(FlakyStore::new(SqliteStore::open_in_memory().await.unwrap()))
}

fn pid(s: &str) -> Pid { Pid::new(s).unwrap() }

fn snapshot(value: serde_json::Value) -> RemoteSnapshot { serde_json::from_value(value).unwrap() }

/// Villages 1 and 2, group 10, students A and B, volunteer V.
fn base_snapshot() -> RemoteSnapshot {
  snapshot(json!({
    "villages": [{ "id": 1, "name": "Wadi" }, { "id": 2, "name": "Khed" }],
    "groups": [{ "id": 10, "name": "Morning" }],
    "students": [
      { "pid": "A", "firstName": "Asha", "villageId": 1, "groupId": 10, "gender": "female" },
      { "pid": "B", "firstName": "Bhim", "villageId": 2, "groupId": 10 }
    ],
    "volunteers": [{ "pid": "V", "firstName": "Vidya", "villageId": 1 }]
  }))
}

fn capture() -> FaceCapture {
  FaceCapture {
    raw_frame:       b"frame".to_vec(),
    face_crop:       b"crop".to_vec(),
    normalized_face: b"face".to_vec(),
  }
}

fn incoming(title: &str) -> IncomingNotification {
  IncomingNotification {
    title:      title.into(),
    body:       "body".into(),
    channel_id: "general".into(),
    timestamp:  Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
  }
}

// ─── Sync ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_writes_every_family() {
  let f = Fixture::new().await;
  let report = f.sync().sync_to_local_db(base_snapshot()).await.unwrap();

  assert_eq!((report.villages, report.groups, report.students, report.volunteers), (2, 1, 2, 1));
  assert!(report.deferred.is_empty());
  assert!(f.store.student_exists(pid("A")).await.unwrap());
  assert!(f.store.volunteer_exists(pid("V")).await.unwrap());
  assert_eq!(f.store.get_village(2).await.unwrap().unwrap().name, "Khed");
}

#[tokio::test]
async fn sync_is_idempotent() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let first = f.store.list_students().await.unwrap();

  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  assert_eq!(f.store.list_students().await.unwrap(), first);
  assert_eq!(f.store.list_villages().await.unwrap().len(), 2);
}

#[tokio::test]
async fn sync_updates_changed_rows() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();

  let changed = snapshot(json!({
    "students": [{ "pid": "A", "firstName": "Asha", "lastName": "Patil", "villageId": 2, "groupId": 10 }]
  }));
  f.sync().sync_to_local_db(changed).await.unwrap();

  let a = f.store.get_student(pid("A")).await.unwrap().unwrap();
  assert_eq!(a.village_id, 2);
  assert_eq!(a.last_name.as_deref(), Some("Patil"));
}

#[tokio::test]
async fn sync_never_removes_absent_rows() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();

  let smaller = snapshot(json!({
    "villages": [{ "id": 1, "name": "Wadi" }],
    "groups": [{ "id": 10, "name": "Morning" }],
    "students": [{ "pid": "A", "firstName": "Asha", "villageId": 1, "groupId": 10 }]
  }));
  f.sync().sync_to_local_db(smaller.clone()).await.unwrap();

  assert!(f.store.student_exists(pid("B")).await.unwrap());
  assert!(f.store.village_exists(2).await.unwrap());
  assert_eq!(f.sync().stale_students(&smaller).await.unwrap(), vec![pid("B")]);
}

#[tokio::test]
async fn empty_snapshot_changes_nothing() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();

  let report = f.sync().sync_to_local_db(RemoteSnapshot::default()).await.unwrap();
  assert_eq!(report.students, 0);
  assert_eq!(f.store.list_students().await.unwrap().len(), 2);
}

#[tokio::test]
async fn student_with_unknown_village_is_deferred() {
  let f = Fixture::new().await;
  let snap = snapshot(json!({
    "villages": [{ "id": 1, "name": "Wadi" }],
    "groups": [{ "id": 10, "name": "Morning" }],
    "students": [
      { "pid": "A", "firstName": "Asha", "villageId": 1, "groupId": 10 },
      { "pid": "Z", "firstName": "Zoya", "villageId": 99, "groupId": 10 }
    ]
  }));

  let report = f.sync().sync_to_local_db(snap).await.unwrap();
  assert_eq!(report.students, 1);
  assert_eq!(report.deferred, vec![pid("Z")]);
  assert!(!f.store.student_exists(pid("Z")).await.unwrap());

  // The village arrives later; a re-sync picks the student up.
  let later = snapshot(json!({
    "villages": [{ "id": 99, "name": "Late" }],
    "students": [{ "pid": "Z", "firstName": "Zoya", "villageId": 99, "groupId": 10 }]
  }));
  let report = f.sync().sync_to_local_db(later).await.unwrap();
  assert!(report.deferred.is_empty());
  assert!(f.store.student_exists(pid("Z")).await.unwrap());
}

#[tokio::test]
async fn student_can_reference_previously_cached_village() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();

  let only_students = snapshot(json!({
    "students": [{ "pid": "C", "firstName": "Chetan", "villageId": 2, "groupId": 10 }]
  }));
  let report = f.sync().sync_to_local_db(only_students).await.unwrap();
  assert_eq!(report.students, 1);
}

#[tokio::test]
async fn atomic_sync_applies_everything() {
  let f = Fixture::new().await;
  let report = f.atomic_sync().sync(base_snapshot()).await.unwrap();

  assert_eq!(report.students, 2);
  assert!(f.store.student_exists(pid("B")).await.unwrap());
  assert!(f.store.volunteer_exists(pid("V")).await.unwrap());
}

#[tokio::test]
async fn atomic_sync_defers_against_snapshot_and_cache() {
  let f = Fixture::new().await;
  let snap = snapshot(json!({
    "villages": [{ "id": 1, "name": "Wadi" }],
    "groups": [{ "id": 10, "name": "Morning" }],
    "students": [
      { "pid": "A", "firstName": "Asha", "villageId": 1, "groupId": 10 },
      { "pid": "Z", "firstName": "Zoya", "villageId": 1, "groupId": 77 }
    ]
  }));

  let report = f.atomic_sync().sync_atomic(snap).await.unwrap();
  assert_eq!(report.deferred, vec![pid("Z")]);
  assert!(f.store.student_exists(pid("A")).await.unwrap());
}

#[tokio::test]
async fn failing_student_row_reports_family_and_progress() {
  let store = flaky_store().await;
  store.fail_student_upserts_after(1);
  let engine = SyncEngine::new(store.clone(), SyncConfig::default());

  let err = engine.sync_to_local_db(base_snapshot()).await.unwrap_err();
  let msg = err.to_string();
  match err {
    Error::SyncPartial { family, upserted, committed, .. } => {
      assert_eq!(family, Family::Student);
      assert_eq!(upserted, 1);
      assert_eq!(committed, vec![Family::Village, Family::Group]);
    }
    other => panic!("expected SyncPartial, got {other}"),
  }
  assert!(msg.contains("student") && msg.contains("after 1"), "{msg}");

  // Earlier families and the first student stay; later rows never landed.
  assert!(store.inner.village_exists(2).await.unwrap());
  assert!(store.inner.student_exists(pid("A")).await.unwrap());
  assert!(!store.inner.student_exists(pid("B")).await.unwrap());
  assert!(!store.inner.volunteer_exists(pid("V")).await.unwrap());

  // Re-running the same snapshot completes it.
  store.fail_student_upserts_after(usize::MAX);
  engine.sync_to_local_db(base_snapshot()).await.unwrap();
  assert!(store.inner.student_exists(pid("B")).await.unwrap());
  assert!(store.inner.volunteer_exists(pid("V")).await.unwrap());
}

#[tokio::test]
async fn failing_reference_check_is_reported_as_student_family() {
  let store = flaky_store().await;
  store.fail_group_lookups();

  let err = SyncEngine::new(store.clone(), SyncConfig::default())
    .sync_to_local_db(base_snapshot())
    .await
    .unwrap_err();
  match err {
    Error::SyncPartial { family, upserted, committed, .. } => {
      assert_eq!(family, Family::Student);
      assert_eq!(upserted, 0);
      assert_eq!(committed, vec![Family::Village, Family::Group]);
    }
    other => panic!("expected SyncPartial, got {other}"),
  }
  assert!(store.inner.village_exists(1).await.unwrap());
  assert!(store.inner.list_students().await.unwrap().is_empty());
}

#[tokio::test]
async fn atomic_sync_failure_commits_nothing() {
  let store = flaky_store().await;
  store.fail_group_lookups();

  // Group 77 is not in the snapshot, so the cache is consulted and fails.
  let snap = snapshot(json!({
    "villages": [{ "id": 1, "name": "Wadi" }],
    "students": [{ "pid": "A", "firstName": "Asha", "villageId": 1, "groupId": 77 }]
  }));
  let err = SyncEngine::new(store.clone(), SyncConfig { atomic: true })
    .sync(snap)
    .await
    .unwrap_err();
  assert!(err.is_storage(), "{err}");
  assert!(!store.inner.village_exists(1).await.unwrap());
}

// ─── Profiles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn existence_follows_upsert_and_delete() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();

  assert!(profiles.check_if_student_with_pid_exists(pid("A")).await.unwrap());
  assert!(!profiles.check_if_student_with_pid_exists(pid("nobody")).await.unwrap());

  profiles.delete_student_profile(pid("A")).await.unwrap();
  assert!(!profiles.check_if_student_with_pid_exists(pid("A")).await.unwrap());
  assert!(profiles.get_student_details(pid("A")).await.unwrap().is_none());
}

#[tokio::test]
async fn update_profile_replaces_details() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();

  let mut a = profiles.get_student_details(pid("A")).await.unwrap().unwrap();
  a.school_class = Some("7".into());
  profiles.update_student_profile(a.clone()).await.unwrap();

  assert_eq!(profiles.get_student_details(pid("A")).await.unwrap(), Some(a));
}

#[tokio::test]
async fn save_face_artifacts_requires_student() {
  let f = Fixture::new().await;
  let err = f.profiles().save_face_artifacts(pid("ghost"), capture()).await.unwrap_err();
  assert!(matches!(err, Error::StudentNotFound(ref p) if *p == pid("ghost")), "{err}");
  assert!(f.artifacts.list_pids().await.unwrap().is_empty());
}

#[tokio::test]
async fn saved_capture_is_complete_and_readable() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();

  assert_eq!(profiles.artifact_presence(pid("A")).await.unwrap(), ArtifactPresence::None);
  let records = profiles.save_face_artifacts(pid("A"), capture()).await.unwrap();
  assert_eq!(records.len(), 3);

  assert_eq!(profiles.artifact_presence(pid("A")).await.unwrap(), ArtifactPresence::Complete);
  let crop = f.artifacts.read(pid("A"), ArtifactKind::FaceCrop).await.unwrap();
  assert_eq!(crop.as_deref(), Some(&b"crop"[..]));
}

#[tokio::test]
async fn embeddings_require_student() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();

  let stored = profiles
    .add_embeddings(pid("A"), vec![vec![0.5, 0.25], vec![1.0, 0.0]], Some("m1".into()))
    .await
    .unwrap();
  assert_eq!(stored.len(), 2);
  assert_eq!(profiles.get_embeddings(pid("A")).await.unwrap().len(), 2);

  let err = profiles.add_embeddings(pid("nobody"), vec![vec![0.0]], None).await.unwrap_err();
  assert!(matches!(err, Error::StudentNotFound(_)));
}

#[tokio::test]
async fn delete_removes_row_embeddings_and_files() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();
  profiles.save_face_artifacts(pid("A"), capture()).await.unwrap();
  profiles.add_embeddings(pid("A"), vec![vec![0.1]], None).await.unwrap();

  let report = profiles.delete_student_profile(pid("A")).await.unwrap();
  assert!(report.existed);
  assert_eq!(report.files_removed, 3);

  assert!(!f.store.student_exists(pid("A")).await.unwrap());
  assert!(f.store.get_embeddings(pid("A")).await.unwrap().is_empty());
  assert!(f.store.get_face_artifacts(pid("A")).await.unwrap().is_empty());
  assert!(f.store.pending_tombstones().await.unwrap().is_empty());
  for kind in ArtifactKind::ALL {
    assert!(!f.artifacts.exists(pid("A"), kind).await.unwrap());
  }

  // Other students are untouched.
  assert!(f.store.student_exists(pid("B")).await.unwrap());
}

#[tokio::test]
async fn delete_of_absent_pid_is_noop() {
  let f = Fixture::new().await;
  let report = f.profiles().delete_student_profile(pid("nobody")).await.unwrap();
  assert!(!report.existed);
  assert_eq!(report.files_removed, 0);

  // Twice in a row is fine as well.
  f.profiles().delete_student_profile(pid("nobody")).await.unwrap();
}

#[tokio::test]
async fn delete_without_artifacts_succeeds() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();

  let report = f.profiles().delete_student_profile(pid("B")).await.unwrap();
  assert!(report.existed);
  assert_eq!(report.files_removed, 0);
}

#[tokio::test]
async fn attendance_survives_profile_deletion() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();

  profiles
    .record_attendance(NewAttendance {
      pid:       pid("A"),
      group_id:  Some(10),
      method:    AttendanceMethod::Face,
      marked_at: None,
    })
    .await
    .unwrap();
  profiles.delete_student_profile(pid("A")).await.unwrap();

  assert_eq!(f.store.list_attendance(pid("A")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn resynced_student_comes_back_without_biometrics() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();
  profiles.save_face_artifacts(pid("A"), capture()).await.unwrap();
  profiles.delete_student_profile(pid("A")).await.unwrap();

  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  assert!(profiles.check_if_student_with_pid_exists(pid("A")).await.unwrap());
  assert_eq!(profiles.artifact_presence(pid("A")).await.unwrap(), ArtifactPresence::None);
}

#[tokio::test]
async fn delete_failing_on_files_leaves_tombstone_for_retry() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();
  profiles.save_face_artifacts(pid("A"), capture()).await.unwrap();
  profiles.add_embeddings(pid("A"), vec![vec![0.3]], None).await.unwrap();
  f.block_artifact("A", ArtifactKind::FaceCrop);

  let err = profiles.delete_student_profile(pid("A")).await.unwrap_err();
  assert!(err.to_string().contains("at step artifacts"), "{err}");
  match &err {
    Error::DeleteFailed { pid: p, step, source } => {
      assert_eq!(*p, pid("A"));
      assert_eq!(*step, DeleteStep::Artifacts);
      assert!(matches!(**source, Error::ArtifactIo(_)));
    }
    other => panic!("expected DeleteFailed, got {other}"),
  }

  // Phase one held: hidden, no embeddings, no index, tombstone pending.
  assert!(!f.store.student_exists(pid("A")).await.unwrap());
  assert!(f.store.get_embeddings(pid("A")).await.unwrap().is_empty());
  assert_eq!(profiles.artifact_presence(pid("A")).await.unwrap(), ArtifactPresence::None);
  let pending = f.store.pending_tombstones().await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].pid, pid("A"));

  // The sweep cannot finish it either while the path is blocked.
  let report = profiles.sweep().await.unwrap();
  assert_eq!(report.failed, vec![pid("A")]);

  f.unblock_artifact("A", ArtifactKind::FaceCrop);
  let report = profiles.delete_student_profile(pid("A")).await.unwrap();
  assert!(!report.existed);
  assert!(f.store.pending_tombstones().await.unwrap().is_empty());
  for kind in ArtifactKind::ALL {
    assert!(!f.artifacts.exists(pid("A"), kind).await.unwrap());
  }
}

#[tokio::test]
async fn failed_capture_leaves_no_partial_set() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();
  f.block_artifact("A", ArtifactKind::FaceCrop);

  let err = profiles.save_face_artifacts(pid("A"), capture()).await.unwrap_err();
  assert!(matches!(err, Error::ArtifactIo(_)), "{err}");

  assert!(!f.artifacts.exists(pid("A"), ArtifactKind::RawFrame).await.unwrap());
  assert!(!f.artifacts.exists(pid("A"), ArtifactKind::NormalizedFace).await.unwrap());
  assert_eq!(profiles.artifact_presence(pid("A")).await.unwrap(), ArtifactPresence::None);
}

#[tokio::test]
async fn failed_recapture_discards_previous_set() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();
  profiles.save_face_artifacts(pid("A"), capture()).await.unwrap();
  f.block_artifact("A", ArtifactKind::NormalizedFace);

  let fresh = FaceCapture {
    raw_frame:       b"frame-2".to_vec(),
    face_crop:       b"crop-2".to_vec(),
    normalized_face: b"face-2".to_vec(),
  };
  assert!(profiles.save_face_artifacts(pid("A"), fresh).await.is_err());

  assert!(!f.artifacts.exists(pid("A"), ArtifactKind::RawFrame).await.unwrap());
  assert!(!f.artifacts.exists(pid("A"), ArtifactKind::FaceCrop).await.unwrap());
  assert_eq!(profiles.artifact_presence(pid("A")).await.unwrap(), ArtifactPresence::None);

  f.unblock_artifact("A", ArtifactKind::NormalizedFace);
  profiles.save_face_artifacts(pid("A"), capture()).await.unwrap();
  assert_eq!(profiles.artifact_presence(pid("A")).await.unwrap(), ArtifactPresence::Complete);
}

// ─── Sweep ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sweep_finishes_interrupted_deletion() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();
  profiles.save_face_artifacts(pid("A"), capture()).await.unwrap();

  // Phase one committed, then the process died.
  f.store.tombstone_student(pid("A")).await.unwrap();
  assert!(f.artifacts.exists(pid("A"), ArtifactKind::RawFrame).await.unwrap());

  let report = profiles.sweep().await.unwrap();
  assert_eq!(report.redriven, vec![pid("A")]);
  assert!(report.failed.is_empty());

  for kind in ArtifactKind::ALL {
    assert!(!f.artifacts.exists(pid("A"), kind).await.unwrap());
  }
  assert!(f.store.get_face_artifacts(pid("A")).await.unwrap().is_empty());
  assert!(f.store.pending_tombstones().await.unwrap().is_empty());
}

#[tokio::test]
async fn sweep_removes_orphan_files() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();
  profiles.save_face_artifacts(pid("A"), capture()).await.unwrap();
  f.artifacts.write(pid("ghost"), ArtifactKind::FaceCrop, b"x".to_vec()).await.unwrap();

  let report = profiles.sweep().await.unwrap();
  assert_eq!(report.orphans_removed, vec![pid("ghost")]);
  assert!(!f.artifacts.exists(pid("ghost"), ArtifactKind::FaceCrop).await.unwrap());

  // Files of a live student stay.
  assert_eq!(profiles.artifact_presence(pid("A")).await.unwrap(), ArtifactPresence::Complete);
  assert!(f.artifacts.exists(pid("A"), ArtifactKind::RawFrame).await.unwrap());
}

#[tokio::test]
async fn sweep_keeps_revived_row_but_drops_old_files() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();
  profiles.save_face_artifacts(pid("A"), capture()).await.unwrap();

  f.store.tombstone_student(pid("A")).await.unwrap();
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();

  let report = profiles.sweep().await.unwrap();
  assert_eq!(report.revived, vec![pid("A")]);
  assert!(report.redriven.is_empty());
  assert!(f.store.student_exists(pid("A")).await.unwrap());
  assert!(f.store.pending_tombstones().await.unwrap().is_empty());

  // Files from before the tombstone are gone along with their index.
  assert_eq!(profiles.artifact_presence(pid("A")).await.unwrap(), ArtifactPresence::None);
  for kind in ArtifactKind::ALL {
    assert!(!f.artifacts.exists(pid("A"), kind).await.unwrap());
  }
}

#[tokio::test]
async fn revived_student_whose_files_were_already_removed_reads_unenrolled() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();
  profiles.save_face_artifacts(pid("A"), capture()).await.unwrap();

  // Phase one and the file removal ran; the process died before reap.
  f.store.tombstone_student(pid("A")).await.unwrap();
  for kind in ArtifactKind::ALL {
    f.artifacts.delete(pid("A"), kind).await.unwrap();
  }
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();

  let report = profiles.sweep().await.unwrap();
  assert_eq!(report.revived, vec![pid("A")]);
  assert_eq!(profiles.artifact_presence(pid("A")).await.unwrap(), ArtifactPresence::None);
  assert!(f.artifacts.list_pids().await.unwrap().is_empty());
}

#[tokio::test]
async fn revived_and_recaptured_student_keeps_new_capture() {
  let f = Fixture::new().await;
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  let profiles = f.profiles();
  profiles.save_face_artifacts(pid("A"), capture()).await.unwrap();

  f.store.tombstone_student(pid("A")).await.unwrap();
  f.sync().sync_to_local_db(base_snapshot()).await.unwrap();
  profiles.save_face_artifacts(pid("A"), capture()).await.unwrap();

  let report = profiles.sweep().await.unwrap();
  assert_eq!(report.revived, vec![pid("A")]);
  assert_eq!(profiles.artifact_presence(pid("A")).await.unwrap(), ArtifactPresence::Complete);
  for kind in ArtifactKind::ALL {
    assert!(f.artifacts.exists(pid("A"), kind).await.unwrap());
  }
}

#[tokio::test]
async fn sweep_on_clean_state_reports_nothing() {
  let f = Fixture::new().await;
  let report = f.profiles().sweep().await.unwrap();
  assert_eq!(report, SweepReport::default());
}

// ─── Inbox ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn inbox_classifies_on_insert() {
  let f = Fixture::new().await;
  let inbox = f.inbox(InboxConfig::default());

  let cases = [
    ("Congratulations, you are now a volunteer", NotificationKind::MyVolunteerRequestUpdate),
    ("Request Rejected", NotificationKind::MyVolunteerRequestUpdate),
    ("New Volunteer Request from Ravi", NotificationKind::NewVolunteerRequest),
    ("Thanks for volunteering!", NotificationKind::AppreciationForVolunteering),
    ("new volunteer request", NotificationKind::Text),
  ];
  for (title, kind) in cases {
    let stored = inbox.insert_notification(incoming(title)).await.unwrap().unwrap();
    assert_eq!(stored.kind, kind, "{title}");
    assert_eq!(stored.title, title);
    assert!(!stored.is_read);
  }
}

#[tokio::test]
async fn unread_count_tracks_reads() {
  let f = Fixture::new().await;
  let inbox = f.inbox(InboxConfig::default());
  let rx = inbox.subscribe_unread_count();

  let mut ids = Vec::new();
  for i in 0..4 {
    let n = inbox.insert_notification(incoming(&format!("note {i}"))).await.unwrap().unwrap();
    ids.push(n.id);
  }
  assert_eq!(inbox.unread_count().await.unwrap(), 4);

  inbox.mark_read(ids[0]).await.unwrap();
  inbox.mark_read(ids[0]).await.unwrap();
  inbox.mark_read(ids[2]).await.unwrap();
  assert_eq!(inbox.unread_count().await.unwrap(), 2);
  assert_eq!(*rx.borrow(), 2);

  assert_eq!(inbox.mark_all_read().await.unwrap(), 2);
  assert_eq!(inbox.unread_count().await.unwrap(), 0);
}

#[tokio::test]
async fn duplicates_kept_without_dedupe() {
  let f = Fixture::new().await;
  let inbox = f.inbox(InboxConfig::default());

  inbox.ingest(incoming("Hello")).await.unwrap().unwrap();
  inbox.ingest(incoming("Hello")).await.unwrap().unwrap();
  assert_eq!(inbox.notifications().await.unwrap().len(), 2);
}

#[tokio::test]
async fn duplicates_dropped_with_dedupe() {
  let f = Fixture::new().await;
  let inbox = f.inbox(InboxConfig { dedupe: true, ..InboxConfig::default() });

  assert!(inbox.ingest(incoming("Hello")).await.unwrap().is_some());
  assert!(inbox.ingest(incoming("Hello")).await.unwrap().is_none());
  assert!(inbox.ingest(incoming("Other")).await.unwrap().is_some());
  assert_eq!(inbox.notifications().await.unwrap().len(), 2);
}

#[tokio::test]
async fn inbox_deletes() {
  let f = Fixture::new().await;
  let inbox = f.inbox(InboxConfig::default());
  let rx = inbox.subscribe_notifications();

  let a = inbox.insert_notification(incoming("a")).await.unwrap().unwrap();
  inbox.insert_notification(incoming("b")).await.unwrap();
  assert_eq!(rx.borrow().len(), 2);

  inbox.delete(a.id).await.unwrap();
  inbox.delete(a.id).await.unwrap();
  assert_eq!(inbox.notifications().await.unwrap().len(), 1);

  inbox.delete_all().await.unwrap();
  assert!(inbox.notifications().await.unwrap().is_empty());
  assert!(rx.borrow().is_empty());
  assert_eq!(inbox.unread_count().await.unwrap(), 0);
}

#[tokio::test]
async fn ingest_retries_transient_storage_failures() {
  let store = flaky_store().await;
  let config = InboxConfig { max_attempts: 3, retry_backoff_ms: 0, ..InboxConfig::default() };
  let inbox = NotificationInbox::new(store.clone(), config);

  store.fail_next_inserts(2);
  assert!(inbox.ingest(incoming("Hello")).await.unwrap().is_some());

  store.fail_next_inserts(3);
  let err = inbox.ingest(incoming("Hello")).await.unwrap_err();
  assert!(err.is_storage(), "{err}");

  // Plain inserts do not retry.
  store.fail_next_inserts(1);
  assert!(inbox.insert_notification(incoming("Hello")).await.is_err());
  assert_eq!(inbox.notifications().await.unwrap().len(), 1);
}
