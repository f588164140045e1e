use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::fsio;
use crate::unit::WorkUnit;

/// Durable checkpoint of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub completed_units: BTreeSet<WorkUnit>,
    pub current_unit: Option<WorkUnit>,
    pub total_records_processed: u64,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub failed_units: BTreeSet<WorkUnit>,
}

impl ProgressState {
    /// Units of `units` not yet completed, in the order given.
    pub fn remaining(&self, units: &[WorkUnit]) -> Vec<WorkUnit> {
        units
            .iter()
            .copied()
            .filter(|u| !self.completed_units.contains(u))
            .collect()
    }

    /// Mark `unit` in flight.
    pub fn begin(mut self, unit: WorkUnit) -> Self {
        self.current_unit = Some(unit);
        self
    }

    /// Move `unit` from in-flight to completed and count its records.
    pub fn complete(mut self, unit: WorkUnit, records: u64) -> Self {
        if self.current_unit == Some(unit) {
            self.current_unit = None;
        }
        self.failed_units.remove(&unit);
        if self.completed_units.insert(unit) {
            self.total_records_processed += records;
        }
        self
    }

    /// Record that `unit` failed; it stays eligible for the next run.
    pub fn fail(mut self, unit: WorkUnit) -> Self {
        if self.current_unit == Some(unit) {
            self.current_unit = None;
        }
        if !self.completed_units.contains(&unit) {
            self.failed_units.insert(unit);
        }
        self
    }

    pub fn touch(mut self) -> Self {
        self.last_updated = Some(Utc::now());
        self
    }
}

/// Single injected persistence point for [`ProgressState`].
pub trait ProgressStore {
    fn load(&self) -> Result<ProgressState, StoreError>;
    fn save(&self, state: &ProgressState) -> Result<(), StoreError>;
    fn reset(&self) -> Result<(), StoreError>;
}

/// Progress kept in one pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Take exclusive ownership of this store for the lifetime of the guard.
    pub fn lock(&self) -> Result<StoreLock, StoreError> {
        StoreLock::acquire(self.lock_path())
    }
}

impl ProgressStore for JsonFileStore {
    fn load(&self) -> Result<ProgressState, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No progress file at {}, starting fresh", self.path.display());
                return Ok(ProgressState::default());
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let state: ProgressState =
            serde_json::from_str(&raw).map_err(|e| StoreError::CorruptState {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if let Some(current) = state.current_unit {
            if state.completed_units.contains(&current) {
                return Err(StoreError::CorruptState {
                    path: self.path.clone(),
                    reason: format!("current unit {} is also marked completed", current),
                });
            }
        }
        Ok(state)
    }

    fn save(&self, state: &ProgressState) -> Result<(), StoreError> {
        let mut bytes = serde_json::to_vec_pretty(state)?;
        bytes.push(b'\n');
        fsio::write_atomic(&self.path, &bytes).map_err(|e| StoreError::io(&self.path, e))
    }

    fn reset(&self) -> Result<(), StoreError> {
        self.save(&ProgressState::default().touch())
    }
}

/// Lock file guard; removed on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    fn acquire(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                if let Err(e) = write_owner(&mut f).and_then(|_| f.sync_all()) {
                    drop(f);
                    let _ = fs::remove_file(&path);
                    return Err(StoreError::io(&path, e));
                }
                Ok(StoreLock { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path).unwrap_or_default();
                Err(StoreError::Locked {
                    owner: format!(
                        "{}; delete {} if no other run is active",
                        holder.trim(),
                        path.display()
                    ),
                    path,
                })
            }
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

fn write_owner(w: &mut impl Write) -> io::Result<()> {
    writeln!(w, "pid {} since {}", std::process::id(), Utc::now().to_rfc3339())?;
    w.flush()
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}
