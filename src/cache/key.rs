//! Request keys: the identity of a cacheable read.

use std::collections::BTreeMap;
use std::fmt;

/// One segment of a [`RequestKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
  Str(String),
  Int(i64),
  /// Named parameters, ordered by name so equal maps compare equal
  Params(BTreeMap<String, String>),
}

impl From<&str> for KeyPart {
  fn from(value: &str) -> Self {
    Self::Str(value.to_string())
  }
}

impl From<String> for KeyPart {
  fn from(value: String) -> Self {
    Self::Str(value)
  }
}

impl From<i64> for KeyPart {
  fn from(value: i64) -> Self {
    Self::Int(value)
  }
}

impl From<u32> for KeyPart {
  fn from(value: u32) -> Self {
    Self::Int(i64::from(value))
  }
}

impl From<BTreeMap<String, String>> for KeyPart {
  fn from(value: BTreeMap<String, String>) -> Self {
    Self::Params(value)
  }
}

impl fmt::Display for KeyPart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Str(s) => write!(f, "{}", s),
      Self::Int(i) => write!(f, "{}", i),
      Self::Params(params) => {
        let joined: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", joined.join(","))
      }
    }
  }
}

/// Ordered tuple of (operation, parameters...).
///
/// Two keys are equal iff every part is equal by value. Keys nest: `dreams`
/// is a prefix of `dreams/list/{page=1}`, which lets callers invalidate a
/// whole family of reads at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
  parts: Vec<KeyPart>,
}

impl RequestKey {
  pub fn new(operation: impl Into<KeyPart>) -> Self {
    Self {
      parts: vec![operation.into()],
    }
  }

  /// Extend the key with another part.
  pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
    self.parts.push(part.into());
    self
  }

  pub fn parts(&self) -> &[KeyPart] {
    &self.parts
  }

  /// True if `prefix` matches the leading parts of this key (or all of it).
  pub fn starts_with(&self, prefix: &RequestKey) -> bool {
    self.parts.starts_with(&prefix.parts)
  }
}

impl fmt::Display for RequestKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, part) in self.parts.iter().enumerate() {
      if i > 0 {
        write!(f, "/")?;
      }
      write!(f, "{}", part)?;
    }
    Ok(())
  }
}
