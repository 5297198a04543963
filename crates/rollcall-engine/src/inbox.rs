//! Notification ingestion and inbox reads.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use rollcall_core::{
  notification::{IncomingNotification, NewNotification, Notification},
  store::CacheStore,
};
use sha2::{Digest as _, Sha256};
use tokio::sync::watch;

use crate::{Error, InboxConfig, Result};

pub struct NotificationInbox<S> {
  store:  Arc<S>,
  config: InboxConfig,
}

impl<S: CacheStore> NotificationInbox<S> {
  pub fn new(store: Arc<S>, config: InboxConfig) -> Self { Self { store, config } }

  /// Classify and store one notification.
  ///
  /// Returns `None` when deduplication is enabled and an equivalent
  /// notification is already stored.
  pub async fn insert_notification(
    &self,
    incoming: IncomingNotification,
  ) -> Result<Option<Notification>> {
    let n = NewNotification::classify(incoming, Utc::now());
    self.store_classified(n).await
  }

  /// Like [`Self::insert_notification`], retrying storage failures with a
  /// linear backoff.
  pub async fn ingest(&self, incoming: IncomingNotification) -> Result<Option<Notification>> {
    let n = NewNotification::classify(incoming, Utc::now());
    let attempts = self.config.max_attempts.max(1);

    let mut attempt = 1;
    loop {
      match self.store_classified(n.clone()).await {
        Err(e) if e.is_storage() && attempt < attempts => {
          tracing::warn!(attempt, attempts, error = %e, "notification insert failed, retrying");
          let backoff = self.config.retry_backoff_ms.saturating_mul(u64::from(attempt));
          tokio::time::sleep(Duration::from_millis(backoff)).await;
          attempt += 1;
        }
        other => return other,
      }
    }
  }

  async fn store_classified(&self, n: NewNotification) -> Result<Option<Notification>> {
    let key = self.config.dedupe.then(|| dedup_key(&n, self.config.dedupe_bucket_secs));
    let kind = n.kind;
    let stored = self.store.insert_notification(n, key).await.map_err(Error::storage)?;
    match &stored {
      Some(n) => tracing::debug!(id = n.id, %kind, "notification stored"),
      None => tracing::debug!(%kind, "duplicate notification dropped"),
    }
    Ok(stored)
  }

  pub async fn mark_read(&self, id: i64) -> Result<()> {
    self.store.mark_read(id).await.map_err(Error::storage)
  }

  pub async fn mark_all_read(&self) -> Result<usize> {
    self.store.mark_all_read().await.map_err(Error::storage)
  }

  pub async fn unread_count(&self) -> Result<u64> {
    self.store.unread_count().await.map_err(Error::storage)
  }

  /// Most recent first.
  pub async fn notifications(&self) -> Result<Vec<Notification>> {
    self.store.list_notifications().await.map_err(Error::storage)
  }

  pub async fn delete(&self, id: i64) -> Result<()> {
    self.store.delete_notification(id).await.map_err(Error::storage)
  }

  pub async fn delete_all(&self) -> Result<()> {
    self.store.delete_all_notifications().await.map_err(Error::storage)
  }

  pub fn subscribe_unread_count(&self) -> watch::Receiver<u64> {
    self.store.subscribe_unread_count()
  }

  pub fn subscribe_notifications(&self) -> watch::Receiver<Arc<Vec<Notification>>> {
    self.store.subscribe_notifications()
  }
}

/// Identity of a notification for deduplication: title, body and the
/// timestamp rounded down to `bucket_secs`.
pub fn dedup_key(n: &NewNotification, bucket_secs: u64) -> String {
  let bucket = i64::try_from(bucket_secs.max(1)).unwrap_or(i64::MAX);
  let slot = n.timestamp.timestamp().div_euclid(bucket);

  let mut hasher = Sha256::new();
  hasher.update(n.title.as_bytes());
  hasher.update([0]);
  hasher.update(n.body.as_bytes());
  hasher.update([0]);
  hasher.update(slot.to_le_bytes());
  hex::encode(hasher.finalize())
}
