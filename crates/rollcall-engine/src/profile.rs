//! Student profile lifecycle across the cache and artifact stores.
//!
//! This is the only component that deletes or replaces a student identity
//! and the only one that removes artifact files. Deletion is two-phase:
//!
//! 1. **Tombstone** (one transaction): the student disappears from reads,
//!    its embeddings and artifact index rows are dropped and a tombstone is
//!    recorded.
//! 2. **Artifacts**: the three image files are removed; absent files are
//!    fine.
//! 3. **Reap** (one transaction): the row and the tombstone are removed.
//!
//! A crash or error at any point leaves a tombstone behind. Re-running the
//! deletion, or [`ProfileManager::sweep`], drives it to completion.
//! Attendance rows are never touched.

use std::sync::Arc;

use rollcall_core::{
  Pid,
  attendance::{Attendance, NewAttendance},
  biometric::{ArtifactKind, ArtifactPresence, Embedding, FaceCapture, NewEmbedding, StoredArtifact},
  roster::Student,
  store::{ArtifactStore, CacheStore},
};

use crate::{DeleteStep, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
  pub pid:           Pid,
  /// Whether a visible student row existed when the deletion started.
  pub existed:       bool,
  pub files_removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
  /// Interrupted deletions that were completed.
  pub redriven:        Vec<Pid>,
  /// Tombstoned pids that were upserted again before the deletion finished.
  /// The row was kept; files from before the tombstone were removed.
  pub revived:         Vec<Pid>,
  /// Pids whose artifact files had no owning student and were removed.
  pub orphans_removed: Vec<Pid>,
  /// Deletions that failed again; their tombstones remain for next time.
  pub failed:          Vec<Pid>,
}

pub struct ProfileManager<S, A> {
  store:     Arc<S>,
  artifacts: Arc<A>,
}

impl<S: CacheStore, A: ArtifactStore> ProfileManager<S, A> {
  pub fn new(store: Arc<S>, artifacts: Arc<A>) -> Self { Self { store, artifacts } }

  // ─── Deletion ─────────────────────────────────────────────────────────────

  /// Delete a student's row, embeddings and artifact files.
  ///
  /// Deleting a pid that has nothing left is a successful no-op.
  pub async fn delete_student_profile(&self, pid: Pid) -> Result<DeleteReport> {
    let existed = self
      .store
      .student_exists(pid.clone())
      .await
      .map_err(Error::storage)
      .map_err(Error::at_step(&pid, DeleteStep::Tombstone))?;

    self
      .store
      .tombstone_student(pid.clone())
      .await
      .map_err(Error::storage)
      .map_err(Error::at_step(&pid, DeleteStep::Tombstone))?;
    tracing::debug!(%pid, "tombstoned");

    let files_removed = self.finish_deletion(&pid).await?;

    tracing::info!(%pid, existed, files_removed, "student profile deleted");
    Ok(DeleteReport { pid, existed, files_removed })
  }

  /// Steps two and three for an already-tombstoned pid.
  async fn finish_deletion(&self, pid: &Pid) -> Result<usize> {
    let files_removed = self
      .remove_artifact_files(pid)
      .await
      .map_err(Error::at_step(pid, DeleteStep::Artifacts))?;

    self
      .store
      .reap_student(pid.clone())
      .await
      .map_err(Error::storage)
      .map_err(Error::at_step(pid, DeleteStep::Reap))?;

    Ok(files_removed)
  }

  async fn remove_artifact_files(&self, pid: &Pid) -> Result<usize> {
    let mut removed = 0;
    for kind in ArtifactKind::ALL {
      if self.artifacts.delete(pid.clone(), kind).await.map_err(Error::artifact)? {
        removed += 1;
      }
    }
    Ok(removed)
  }

  /// Crash recovery: finish every interrupted deletion, then remove artifact
  /// files that belong to no student.
  pub async fn sweep(&self) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    let pending = self.store.pending_tombstones().await.map_err(Error::storage)?;
    for tombstone in pending {
      let pid = tombstone.pid;
      let revived = self.store.student_exists(pid.clone()).await.map_err(Error::storage)?;
      let outcome = if revived {
        self.settle_revived(&pid).await
      } else {
        self.finish_deletion(&pid).await.map(|_| ())
      };
      match outcome {
        Ok(_) if revived => report.revived.push(pid),
        Ok(_) => report.redriven.push(pid),
        Err(e) => {
          tracing::warn!(%pid, error = %e, "deletion still incomplete");
          report.failed.push(pid);
        }
      }
    }

    for pid in self.artifacts.list_pids().await.map_err(Error::artifact)? {
      if report.failed.contains(&pid) {
        continue;
      }
      let owned = self.store.student_exists(pid.clone()).await.map_err(Error::storage)?;
      if owned {
        continue;
      }
      match self.remove_orphan(&pid).await {
        Ok(()) => report.orphans_removed.push(pid),
        Err(e) => {
          tracing::warn!(%pid, error = %e, "failed to remove orphan artifacts");
          report.failed.push(pid);
        }
      }
    }

    tracing::info!(
      redriven = report.redriven.len(),
      revived = report.revived.len(),
      orphans_removed = report.orphans_removed.len(),
      failed = report.failed.len(),
      "sweep finished"
    );
    Ok(report)
  }

  /// A pid upserted again after its tombstone: the row stands. Phase one
  /// already dropped the index, so leftover files go too unless a new
  /// capture was recorded since.
  async fn settle_revived(&self, pid: &Pid) -> Result<()> {
    let indexed = self.store.get_face_artifacts(pid.clone()).await.map_err(Error::storage)?;
    if indexed.is_empty() {
      self.remove_artifact_files(pid).await?;
    }
    self.store.reap_student(pid.clone()).await.map_err(Error::storage)
  }

  async fn remove_orphan(&self, pid: &Pid) -> Result<()> {
    self.remove_artifact_files(pid).await?;
    self.store.delete_face_artifacts(pid.clone()).await.map_err(Error::storage)
  }

  // ─── Records ──────────────────────────────────────────────────────────────

  /// Replace a student's details. No artifact side effects.
  pub async fn update_student_profile(&self, student: Student) -> Result<()> {
    self.upsert_student(student).await
  }

  pub async fn upsert_student(&self, student: Student) -> Result<()> {
    self.store.upsert_student(student).await.map_err(Error::storage)
  }

  pub async fn check_if_student_with_pid_exists(&self, pid: Pid) -> Result<bool> {
    self.store.student_exists(pid).await.map_err(Error::storage)
  }

  pub async fn get_student_details(&self, pid: Pid) -> Result<Option<Student>> {
    self.store.get_student(pid).await.map_err(Error::storage)
  }

  pub async fn record_attendance(&self, input: NewAttendance) -> Result<Attendance> {
    self.store.record_attendance(input).await.map_err(Error::storage)
  }

  // ─── Biometrics ───────────────────────────────────────────────────────────

  /// Store a capture for an existing student, overwriting any previous one.
  ///
  /// The index is cleared before the files are written and recorded as a
  /// complete set afterwards, so it never reports a mix of old and new
  /// files. If any write fails, every file for the pid is removed: a
  /// student has all three images or none.
  pub async fn save_face_artifacts(
    &self,
    pid: Pid,
    capture: FaceCapture,
  ) -> Result<Vec<StoredArtifact>> {
    self.require_student(&pid).await?;

    self.store.delete_face_artifacts(pid.clone()).await.map_err(Error::storage)?;

    let mut records = Vec::with_capacity(ArtifactKind::ALL.len());
    for (kind, bytes) in capture.parts() {
      match self.artifacts.write(pid.clone(), kind, bytes.to_vec()).await {
        Ok(record) => records.push(record),
        Err(e) => {
          tracing::warn!(%pid, %kind, error = %e, "capture write failed, discarding set");
          self.discard_artifact_files(&pid).await;
          return Err(Error::artifact(e));
        }
      }
    }

    self
      .store
      .record_face_artifacts(pid.clone(), records.clone())
      .await
      .map_err(Error::storage)?;

    tracing::info!(%pid, "face artifacts saved");
    Ok(records)
  }

  /// Best effort; a file that cannot be removed is logged and left for the
  /// next capture or deletion.
  async fn discard_artifact_files(&self, pid: &Pid) {
    for kind in ArtifactKind::ALL {
      if let Err(e) = self.artifacts.delete(pid.clone(), kind).await {
        tracing::warn!(%pid, %kind, error = %e, "failed to discard artifact");
      }
    }
  }

  pub async fn artifact_presence(&self, pid: Pid) -> Result<ArtifactPresence> {
    let records = self.store.get_face_artifacts(pid).await.map_err(Error::storage)?;
    Ok(ArtifactPresence::from_records(&records))
  }

  pub async fn add_embeddings(
    &self,
    pid: Pid,
    vectors: Vec<Vec<f32>>,
    model: Option<String>,
  ) -> Result<Vec<Embedding>> {
    self.require_student(&pid).await?;

    let mut stored = Vec::with_capacity(vectors.len());
    for vector in vectors {
      let input = NewEmbedding { pid: pid.clone(), vector, model: model.clone() };
      stored.push(self.store.add_embedding(input).await.map_err(Error::storage)?);
    }
    Ok(stored)
  }

  pub async fn get_embeddings(&self, pid: Pid) -> Result<Vec<Embedding>> {
    self.store.get_embeddings(pid).await.map_err(Error::storage)
  }

  async fn require_student(&self, pid: &Pid) -> Result<()> {
    if self.store.student_exists(pid.clone()).await.map_err(Error::storage)? {
      Ok(())
    } else {
      Err(Error::StudentNotFound(pid.clone()))
    }
  }
}
