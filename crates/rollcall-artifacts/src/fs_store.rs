//! Filesystem implementation of [`ArtifactStore`].

use std::{
  collections::BTreeSet,
  io::ErrorKind,
  path::{Path, PathBuf},
  sync::Arc,
};

use chrono::Utc;
use rollcall_core::{
  Pid,
  biometric::{ArtifactKind, StoredArtifact, artifact_file_name, parse_artifact_file_name},
  store::ArtifactStore,
};
use tokio::io::AsyncWriteExt as _;

use crate::{Error, Result, hash::content_hash};

/// Artifact files kept flat under one root directory.
///
/// Cloning is cheap. Construct one per process and share clones; all file
/// access for artifacts goes through this type.
#[derive(Clone, Debug)]
pub struct FsArtifactStore {
  root: Arc<PathBuf>,
}

impl FsArtifactStore {
  /// Open the store rooted at `root`, creating the directory if needed.
  pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
    let root = root.into();
    tokio::fs::create_dir_all(&root).await.map_err(Error::io(&root))?;
    Ok(Self { root: Arc::new(root) })
  }

  pub fn root(&self) -> &Path { &self.root }

  pub fn path_for(&self, pid: &Pid, kind: ArtifactKind) -> PathBuf {
    self.root.join(artifact_file_name(pid, kind))
  }

  fn temp_path_for(&self, pid: &Pid, kind: ArtifactKind) -> PathBuf {
    self.root.join(format!(".{}.tmp", artifact_file_name(pid, kind)))
  }
}

impl ArtifactStore for FsArtifactStore {
  type Error = Error;

  async fn write(&self, pid: Pid, kind: ArtifactKind, bytes: Vec<u8>) -> Result<StoredArtifact> {
    let path = self.path_for(&pid, kind);
    let tmp = self.temp_path_for(&pid, kind);

    // Write aside, flush, then rename over the target so readers see either
    // the old file or the new one.
    let staged = async {
      let mut file = tokio::fs::File::create(&tmp).await.map_err(Error::io(&tmp))?;
      file.write_all(&bytes).await.map_err(Error::io(&tmp))?;
      file.sync_all().await.map_err(Error::io(&tmp))?;
      drop(file);
      tokio::fs::rename(&tmp, &path).await.map_err(Error::io(&path))
    };
    if let Err(e) = staged.await {
      let _ = tokio::fs::remove_file(&tmp).await;
      return Err(e);
    }

    tracing::debug!(%pid, %kind, bytes = bytes.len(), "wrote artifact");

    Ok(StoredArtifact {
      content_hash: content_hash(&bytes),
      byte_len: bytes.len() as u64,
      stored_at: Utc::now(),
      pid,
      kind,
    })
  }

  async fn read(&self, pid: Pid, kind: ArtifactKind) -> Result<Option<Vec<u8>>> {
    let path = self.path_for(&pid, kind);
    match tokio::fs::read(&path).await {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(Error::Io { path, source: e }),
    }
  }

  async fn exists(&self, pid: Pid, kind: ArtifactKind) -> Result<bool> {
    let path = self.path_for(&pid, kind);
    tokio::fs::try_exists(&path).await.map_err(Error::io(path))
  }

  async fn delete(&self, pid: Pid, kind: ArtifactKind) -> Result<bool> {
    let path = self.path_for(&pid, kind);
    match tokio::fs::remove_file(&path).await {
      Ok(()) => {
        tracing::debug!(%pid, %kind, "deleted artifact");
        Ok(true)
      }
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
      Err(e) => Err(Error::Io { path, source: e }),
    }
  }

  async fn list_pids(&self) -> Result<Vec<Pid>> {
    let root = self.root.as_path();
    let mut entries = tokio::fs::read_dir(root).await.map_err(Error::io(root))?;
    let mut pids = BTreeSet::new();

    while let Some(entry) = entries.next_entry().await.map_err(Error::io(root))? {
      let name = entry.file_name();
      if let Some((pid, _)) = name.to_str().and_then(parse_artifact_file_name) {
        pids.insert(pid);
      }
    }

    Ok(pids.into_iter().collect())
  }
}
