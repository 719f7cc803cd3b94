// ============================================================================
// Persistence - Versioned JSON Snapshots
// ============================================================================
//
// One file holds everything that must survive a restart:
//   - engine state (markets, positions, applied relay messages)
//   - collateral balances
//
// Writes go to a sibling temp file first and are renamed into place, so a
// crash mid-write leaves the previous snapshot intact. Events are not
// persisted.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::ledger::Balances;
use crate::market_resolve::EngineState;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to access snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize snapshot: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: chrono::DateTime<chrono::Utc>,
    pub engine: EngineState,
    pub balances: Balances,
}

impl Snapshot {
    pub fn new(engine: EngineState, balances: Balances) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: chrono::Utc::now(),
            engine,
            balances,
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError {
    let path = path.to_path_buf();
    move |source| PersistenceError::Io { path, source }
}

/// Write the snapshot atomically (temp file + rename)
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(io_error(&tmp))?;
    fs::rename(&tmp, path).map_err(io_error(path))?;

    tracing::info!(
        path = %path.display(),
        markets = snapshot.engine.markets.len(),
        positions = snapshot.engine.positions.len(),
        "snapshot saved"
    );
    Ok(())
}

/// Read a snapshot. `Ok(None)` when no file exists yet.
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>, PersistenceError> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_error(path)(err)),
    };

    // check the version before decoding the rest
    #[derive(Deserialize)]
    struct Header {
        version: u32,
    }
    let header: Header = serde_json::from_str(&json)?;
    if header.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: header.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    let snapshot: Snapshot = serde_json::from_str(&json)?;
    Ok(Some(snapshot))
}
