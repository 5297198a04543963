//! `Pid`, the remote-assigned identity key for students and volunteers.
//!
//! A pid is never generated locally. It also names artifact files on disk, so
//! construction rejects anything that could escape the artifact directory.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pid(String);

impl Pid {
  pub fn new(raw: impl Into<String>) -> Result<Self> {
    let raw = raw.into();
    let valid = !raw.is_empty()
      && raw != "."
      && raw != ".."
      && !raw
        .chars()
        .any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control());
    if valid { Ok(Self(raw)) } else { Err(Error::InvalidPid(raw)) }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Pid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for Pid {
  fn as_ref(&self) -> &str { &self.0 }
}

impl FromStr for Pid {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::new(s) }
}

impl TryFrom<String> for Pid {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::new(value) }
}

impl From<Pid> for String {
  fn from(pid: Pid) -> Self { pid.0 }
}
