//! Filesystem backend for face artifacts.
//!
//! Each artifact is one file in a flat directory, named by
//! [`artifact_file_name`](rollcall_core::biometric::artifact_file_name).

mod fs_store;

pub mod error;
pub mod hash;

pub use error::{Error, Result};
pub use fs_store::FsArtifactStore;
