//! Live read channels.
//!
//! Every write that touches notifications republishes the unread count and
//! the ordered list; every write that touches students bumps a revision
//! counter. Subscribers see changes without re-issuing their query.

use std::sync::Arc;

use rollcall_core::{Pid, notification::Notification, roster::Student, store::CacheStore};
use tokio::sync::{Mutex, watch};

use crate::{Error, Result, SqliteStore};

pub(crate) struct Live {
  pub unread:        watch::Sender<u64>,
  pub notifications: watch::Sender<Arc<Vec<Notification>>>,
  pub students:      watch::Sender<u64>,
  /// Held from the re-read to the send so a slower publisher cannot
  /// overwrite a newer list with an older one.
  pub publish:       Mutex<()>,
}

impl Live {
  pub fn new() -> Self {
    Self {
      unread:        watch::Sender::new(0),
      notifications: watch::Sender::new(Arc::new(Vec::new())),
      students:      watch::Sender::new(0),
      publish:       Mutex::new(()),
    }
  }

  pub fn bump_students(&self) { self.students.send_modify(|rev| *rev = rev.wrapping_add(1)); }
}

/// A live view of one student, re-read whenever the students table changes.
pub struct StudentWatch {
  store:     SqliteStore,
  pid:       Pid,
  revisions: watch::Receiver<u64>,
}

impl StudentWatch {
  pub(crate) fn new(store: SqliteStore, pid: Pid) -> Self {
    let revisions = store.subscribe_students();
    Self { store, pid, revisions }
  }

  pub fn pid(&self) -> &Pid { &self.pid }

  /// The student as of now; `None` if absent or being deleted.
  pub async fn current(&mut self) -> Result<Option<Student>> {
    self.revisions.borrow_and_update();
    self.store.get_student(self.pid.clone()).await
  }

  /// Wait for the next student write, then return the re-read value.
  pub async fn changed(&mut self) -> Result<Option<Student>> {
    self.revisions.changed().await.map_err(|_| Error::Closed)?;
    self.current().await
  }
}
