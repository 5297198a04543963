//! Snapshot sync: make the cache store reflect one remote snapshot.
//!
//! Families are applied in dependency order (villages, groups, students,
//! volunteers) so every student's foreign keys exist before it is written.
//! Sync is additive: rows absent from the snapshot are never removed. A
//! student deleted on the backend stays cached until an explicit profile
//! deletion; [`SyncEngine::stale_students`] lists such candidates.

use std::{
  collections::{BTreeSet, HashMap, HashSet},
  future::Future,
  sync::Arc,
};

use rollcall_core::{
  Pid,
  roster::Student,
  snapshot::{LocalSnapshot, RemoteSnapshot},
  store::CacheStore,
};

use crate::{Error, Family, Result, SyncConfig};

/// Row counts written by one sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
  pub villages:   usize,
  pub groups:     usize,
  pub students:   usize,
  pub volunteers: usize,
  /// Students skipped because their village or group is not cached. They
  /// are picked up by a later sync once the referenced rows arrive.
  pub deferred:   Vec<Pid>,
}

pub struct SyncEngine<S> {
  store:  Arc<S>,
  config: SyncConfig,
}

impl<S: CacheStore> SyncEngine<S> {
  pub fn new(store: Arc<S>, config: SyncConfig) -> Self { Self { store, config } }

  /// Sync using the configured mode.
  pub async fn sync(&self, snapshot: RemoteSnapshot) -> Result<SyncReport> {
    if self.config.atomic {
      self.sync_atomic(snapshot).await
    } else {
      self.sync_to_local_db(snapshot).await
    }
  }

  /// Upsert the snapshot row by row, family by family.
  ///
  /// Families already written stay committed if a later one fails; the
  /// error names the failing family and how far it got. Re-running the
  /// same snapshot is always safe.
  pub async fn sync_to_local_db(&self, snapshot: RemoteSnapshot) -> Result<SyncReport> {
    let local = LocalSnapshot::from(snapshot);
    let mut committed = Vec::with_capacity(4);
    let mut report = SyncReport::default();

    report.villages = self
      .upsert_family(Family::Village, local.villages, &committed, |v| {
        self.store.upsert_village(v)
      })
      .await?;
    committed.push(Family::Village);

    report.groups = self
      .upsert_family(Family::Group, local.groups, &committed, |g| self.store.upsert_group(g))
      .await?;
    committed.push(Family::Group);

    let (ready, deferred) = self
      .partition_students(local.students, &HashSet::new(), &HashSet::new())
      .await
      .map_err(|e| sync_partial(Family::Student, 0, &committed, e))?;
    report.deferred = deferred;
    report.students = self
      .upsert_family(Family::Student, ready, &committed, |s| self.store.upsert_student(s))
      .await?;
    committed.push(Family::Student);

    report.volunteers = self
      .upsert_family(Family::Volunteer, local.volunteers, &committed, |v| {
        self.store.upsert_volunteer(v)
      })
      .await?;

    log_report("row-by-row", &report);
    Ok(report)
  }

  /// Apply the whole snapshot in one transaction: either every row lands
  /// or none does.
  pub async fn sync_atomic(&self, snapshot: RemoteSnapshot) -> Result<SyncReport> {
    let mut local = LocalSnapshot::from(snapshot);

    let villages: HashSet<i64> = local.villages.iter().map(|v| v.village_id).collect();
    let groups: HashSet<i64> = local.groups.iter().map(|g| g.group_id).collect();
    let students = std::mem::take(&mut local.students);
    let (ready, deferred) =
      self.partition_students(students, &villages, &groups).await.map_err(Error::storage)?;
    local.students = ready;

    let report = SyncReport {
      villages: local.villages.len(),
      groups: local.groups.len(),
      students: local.students.len(),
      volunteers: local.volunteers.len(),
      deferred,
    };

    self.store.apply_snapshot(local).await.map_err(Error::storage)?;

    log_report("atomic", &report);
    Ok(report)
  }

  /// Cached students that `snapshot` no longer contains. Nothing is
  /// deleted; callers decide whether to remove them.
  pub async fn stale_students(&self, snapshot: &RemoteSnapshot) -> Result<Vec<Pid>> {
    let remote: HashSet<&Pid> = snapshot.students.iter().map(|s| &s.pid).collect();
    let local = self.store.list_student_pids().await.map_err(Error::storage)?;
    Ok(local.into_iter().filter(|pid| !remote.contains(pid)).collect())
  }

  async fn upsert_family<T, F, Fut>(
    &self,
    family: Family,
    rows: Vec<T>,
    committed: &[Family],
    upsert: F,
  ) -> Result<usize>
  where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), S::Error>>,
  {
    let total = rows.len();
    let mut upserted = 0;
    for row in rows {
      if let Err(e) = upsert(row).await {
        tracing::warn!(%family, upserted, total, error = %e, "sync stopped");
        return Err(sync_partial(family, upserted, committed, e));
      }
      upserted += 1;
    }
    tracing::debug!(%family, upserted, "family synced");
    Ok(upserted)
  }

  /// Split students into those whose village and group are known (either in
  /// the given sets or already cached) and those that must wait.
  async fn partition_students(
    &self,
    students: Vec<Student>,
    villages: &HashSet<i64>,
    groups: &HashSet<i64>,
  ) -> Result<(Vec<Student>, Vec<Pid>), S::Error> {
    let village_ids: BTreeSet<i64> = students.iter().map(|s| s.village_id).collect();
    let group_ids: BTreeSet<i64> = students.iter().map(|s| s.group_id).collect();

    let mut village_known = HashMap::with_capacity(village_ids.len());
    for id in village_ids {
      let known = villages.contains(&id) || self.store.village_exists(id).await?;
      village_known.insert(id, known);
    }
    let mut group_known = HashMap::with_capacity(group_ids.len());
    for id in group_ids {
      let known = groups.contains(&id) || self.store.group_exists(id).await?;
      group_known.insert(id, known);
    }

    let mut ready = Vec::with_capacity(students.len());
    let mut deferred = Vec::new();
    for student in students {
      if village_known[&student.village_id] && group_known[&student.group_id] {
        ready.push(student);
      } else {
        tracing::warn!(
          pid = %student.pid,
          village_id = student.village_id,
          group_id = student.group_id,
          "deferring student with unknown village or group"
        );
        deferred.push(student.pid);
      }
    }
    Ok((ready, deferred))
  }
}

fn sync_partial(
  family: Family,
  upserted: usize,
  committed: &[Family],
  source: impl std::error::Error + Send + Sync + 'static,
) -> Error {
  Error::SyncPartial { family, upserted, committed: committed.to_vec(), source: Box::new(source) }
}

fn log_report(mode: &str, report: &SyncReport) {
  tracing::info!(
    mode,
    villages = report.villages,
    groups = report.groups,
    students = report.students,
    volunteers = report.volunteers,
    deferred = report.deferred.len(),
    "snapshot synced"
  );
}
