mod stash;

pub use stash::SessionStash;

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;

/// Directory for everything dreambook keeps on disk (stash, logs).
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("dreambook"))
}

/// Schema for client-side state.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session_stash (
    slot TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    stored_at TEXT NOT NULL
);
"#;
