//! Engine configuration, deserialised as part of the application config.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Apply each snapshot in a single transaction instead of row by row.
  pub atomic: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InboxConfig {
  /// Drop notifications whose title, body and timestamp bucket match one
  /// already stored.
  pub dedupe:             bool,
  pub dedupe_bucket_secs: u64,
  /// Total attempts for an ingestion that hits storage errors.
  pub max_attempts:       u32,
  /// Backoff before retry `n` is `n * retry_backoff_ms`.
  pub retry_backoff_ms:   u64,
}

impl Default for InboxConfig {
  fn default() -> Self {
    Self { dedupe: false, dedupe_bucket_secs: 60, max_attempts: 3, retry_backoff_ms: 200 }
  }
}
