//! Biometric artifacts attached to a student: the three face image files and
//! the embedding vectors derived from them.
//!
//! Files live in the artifact store; their presence is tracked by
//! [`StoredArtifact`] index rows in the cache store so that consistency
//! checks never need to touch the filesystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::Pid;

// ─── Face artifacts ──────────────────────────────────────────────────────────

/// The three image files captured per student.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
  /// The full camera frame the face was detected in.
  RawFrame,
  /// The detected face region cropped out of the frame.
  FaceCrop,
  /// The aligned, normalised face fed to the embedding model.
  NormalizedFace,
}

impl ArtifactKind {
  pub const ALL: [ArtifactKind; 3] =
    [ArtifactKind::RawFrame, ArtifactKind::FaceCrop, ArtifactKind::NormalizedFace];

  fn suffix(self) -> &'static str {
    match self {
      ArtifactKind::RawFrame => "frame",
      ArtifactKind::FaceCrop => "crop",
      ArtifactKind::NormalizedFace => "face",
    }
  }
}

/// Deterministic file name for a student's artifact. This is the only place
/// artifact names are derived.
pub fn artifact_file_name(pid: &Pid, kind: ArtifactKind) -> String {
  format!("{pid}_{}.jpg", kind.suffix())
}

/// Inverse of [`artifact_file_name`]; `None` for files that are not
/// artifacts.
pub fn parse_artifact_file_name(name: &str) -> Option<(Pid, ArtifactKind)> {
  let stem = name.strip_suffix(".jpg")?;
  ArtifactKind::iter().find_map(|kind| {
    let pid = stem.strip_suffix(kind.suffix())?.strip_suffix('_')?;
    Pid::new(pid).ok().map(|pid| (pid, kind))
  })
}

/// Index row recording that an artifact file was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
  pub pid:          Pid,
  pub kind:         ArtifactKind,
  /// SHA-256 hex digest of the file contents.
  pub content_hash: String,
  pub byte_len:     u64,
  pub stored_at:    DateTime<Utc>,
}

/// The three images produced by the capture pipeline for one student.
#[derive(Debug, Clone)]
pub struct FaceCapture {
  pub raw_frame:       Vec<u8>,
  pub face_crop:       Vec<u8>,
  pub normalized_face: Vec<u8>,
}

impl FaceCapture {
  pub fn parts(&self) -> [(ArtifactKind, &[u8]); 3] {
    [
      (ArtifactKind::RawFrame, &self.raw_frame),
      (ArtifactKind::FaceCrop, &self.face_crop),
      (ArtifactKind::NormalizedFace, &self.normalized_face),
    ]
  }
}

/// What the index knows about a student's artifact set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "presence", content = "kinds", rename_all = "snake_case")]
pub enum ArtifactPresence {
  None,
  /// Only reachable through a damaged index; a healthy set is all or nothing.
  Partial(Vec<ArtifactKind>),
  Complete,
}

impl ArtifactPresence {
  pub fn from_records(records: &[StoredArtifact]) -> Self {
    let mut kinds: Vec<ArtifactKind> = records.iter().map(|r| r.kind).collect();
    kinds.sort();
    kinds.dedup();
    match kinds.len() {
      0 => Self::None,
      n if n == ArtifactKind::ALL.len() => Self::Complete,
      _ => Self::Partial(kinds),
    }
  }
}

// ─── Embeddings ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
  pub embedding_id: i64,
  pub pid:          Pid,
  pub vector:       Vec<f32>,
  /// Identifier of the model that produced the vector, if known.
  pub model:        Option<String>,
  pub created_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEmbedding {
  pub pid:    Pid,
  pub vector: Vec<f32>,
  pub model:  Option<String>,
}
