//! Read-once client state that must survive a restart: the dream draft
//! carried across the login redirect and the last interpretation shown on
//! the result screen.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use super::{data_dir, SCHEMA};
use crate::api::types::InterpretResponse;
use crate::api::validation::{dream_length, MIN_DREAM_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
  PendingDream,
  LastInterpretation,
}

impl Slot {
  fn as_str(&self) -> &'static str {
    match self {
      Slot::PendingDream => "pending_dream",
      Slot::LastInterpretation => "last_interpretation",
    }
  }
}

pub struct SessionStash {
  conn: Mutex<Connection>,
}

impl SessionStash {
  /// Open or create the stash at the default location.
  pub fn open() -> Result<Self> {
    let path = data_dir()?.join("session.db");

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create data directory: {}", e))?;
    }

    Self::open_at(&path)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open session database at {}: {}", path.display(), e))?;
    Self::with_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Keep a draft for after login. Drafts too short to interpret are not
  /// kept; returns whether it was stored.
  pub fn put_pending_dream(&self, text: &str) -> Result<bool> {
    if dream_length(text.trim()) < MIN_DREAM_LENGTH {
      return Ok(false);
    }
    self.put(Slot::PendingDream, text, Utc::now())?;
    Ok(true)
  }

  pub fn take_pending_dream(&self) -> Result<Option<String>> {
    self.take(Slot::PendingDream)
  }

  /// Whether a draft is waiting, without consuming it.
  pub fn has_pending_dream(&self) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT EXISTS(SELECT 1 FROM session_stash WHERE slot = ?)",
        params![Slot::PendingDream.as_str()],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to read {}: {}", Slot::PendingDream.as_str(), e))
  }

  pub fn put_last_interpretation(&self, response: &InterpretResponse) -> Result<()> {
    let payload = serde_json::to_string(response)
      .map_err(|e| eyre!("Failed to serialize interpretation: {}", e))?;
    self.put(Slot::LastInterpretation, &payload, Utc::now())
  }

  /// A payload that no longer decodes is dropped and reported as absent.
  pub fn take_last_interpretation(&self) -> Result<Option<InterpretResponse>> {
    let payload = match self.take(Slot::LastInterpretation)? {
      Some(payload) => payload,
      None => return Ok(None),
    };

    match serde_json::from_str(&payload) {
      Ok(response) => Ok(Some(response)),
      Err(e) => {
        debug!(error = %e, "discarding unreadable interpretation");
        Ok(None)
      }
    }
  }

  /// Drop entries stored more than `age` ago.
  pub fn purge_older_than(&self, age: Duration) -> Result<usize> {
    let cutoff = timestamp(Utc::now() - age);
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = conn
      .execute("DELETE FROM session_stash WHERE stored_at < ?", params![cutoff])
      .map_err(|e| eyre!("Failed to purge session stash: {}", e))?;

    if removed > 0 {
      debug!(removed, "purged stale session entries");
    }
    Ok(removed)
  }

  fn put(&self, slot: Slot, payload: &str, at: DateTime<Utc>) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO session_stash (slot, payload, stored_at) VALUES (?, ?, ?)",
        params![slot.as_str(), payload, timestamp(at)],
      )
      .map_err(|e| eyre!("Failed to store {}: {}", slot.as_str(), e))?;

    Ok(())
  }

  /// Read and delete in one transaction.
  fn take(&self, slot: Slot) -> Result<Option<String>> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let payload: Option<String> = tx
      .query_row(
        "SELECT payload FROM session_stash WHERE slot = ?",
        params![slot.as_str()],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", slot.as_str(), e))?;

    tx.execute("DELETE FROM session_stash WHERE slot = ?", params![slot.as_str()])
      .map_err(|e| eyre!("Failed to clear {}: {}", slot.as_str(), e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(payload)
  }
}

/// Fixed-width UTC timestamps so text comparison orders them.
fn timestamp(at: DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::fixtures;

  const DRAFT: &str = "I was lost in a library with endless corridors";

  #[test]
  fn test_pending_dream_is_read_once() {
    let stash = SessionStash::open_in_memory().unwrap();
    assert!(!stash.has_pending_dream().unwrap());
    assert!(stash.put_pending_dream(DRAFT).unwrap());
    assert!(stash.has_pending_dream().unwrap());

    assert_eq!(stash.take_pending_dream().unwrap().as_deref(), Some(DRAFT));
    assert_eq!(stash.take_pending_dream().unwrap(), None);
    assert!(!stash.has_pending_dream().unwrap());
  }

  #[test]
  fn test_short_draft_is_not_kept() {
    let stash = SessionStash::open_in_memory().unwrap();
    assert!(!stash.put_pending_dream("short").unwrap());
    assert_eq!(stash.take_pending_dream().unwrap(), None);
  }

  #[test]
  fn test_last_interpretation_round_trip() {
    let stash = SessionStash::open_in_memory().unwrap();
    let response = InterpretResponse {
      dream_id: "d1".into(),
      interpretation: fixtures::interpretation("d1"),
      similar_dreams: Vec::new(),
      daily_limit_remaining: 0,
      is_saved: true,
    };
    stash.put_last_interpretation(&response).unwrap();

    assert_eq!(stash.take_last_interpretation().unwrap(), Some(response));
    assert_eq!(stash.take_last_interpretation().unwrap(), None);
  }

  #[test]
  fn test_slots_are_independent() {
    let stash = SessionStash::open_in_memory().unwrap();
    stash.put_pending_dream(DRAFT).unwrap();
    assert_eq!(stash.take_last_interpretation().unwrap(), None);
    assert!(stash.take_pending_dream().unwrap().is_some());
  }

  #[test]
  fn test_purge_drops_only_old_entries() {
    let stash = SessionStash::open_in_memory().unwrap();
    stash
      .put(Slot::LastInterpretation, "{}", Utc::now() - Duration::hours(2))
      .unwrap();
    stash.put_pending_dream(DRAFT).unwrap();

    assert_eq!(stash.purge_older_than(Duration::hours(1)).unwrap(), 1);
    assert!(stash.take_pending_dream().unwrap().is_some());
  }

  #[test]
  fn test_survives_reopen() {
    let dir = std::env::temp_dir().join(format!("dreambook-stash-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("session.db");

    SessionStash::open_at(&path).unwrap().put_pending_dream(DRAFT).unwrap();
    let reopened = SessionStash::open_at(&path).unwrap();
    assert_eq!(reopened.take_pending_dream().unwrap().as_deref(), Some(DRAFT));

    let _ = std::fs::remove_dir_all(&dir);
  }
}
