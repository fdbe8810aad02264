// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Durable record of pending auto-revert deadlines.
//!
//! Keys are pin ids, values are absolute fire times in Unix epoch
//! milliseconds, both stored as strings. There is at most one job per pin; a
//! new job silently replaces the old one.

use std::path::Path;
use std::time::Duration;

use pickledb::{PickleDb, PickleDbDumpPolicy, SerializationMethod};
use tracing::warn;

use pwr_core::clock::remaining_until;
use pwr_core::{ControllerError, PinId};

/// Shortest delay a replayed job is armed with.
pub const MIN_REPLAY_DELAY: Duration = Duration::from_millis(100);

const PROBE_KEY: &str = "__probe__";

/// A pending auto-revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledJob {
    pub pin: PinId,
    pub fire_at_ms: i64,
}

pub struct ScheduledJobStore {
    db: PickleDb,
}

impl ScheduledJobStore {
    /// Open (or create) the store at `path` and verify it accepts writes.
    pub fn open(path: &Path) -> Result<Self, ControllerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ControllerError::Store(format!("create {}: {}", parent.display(), e))
                })?;
            }
        }
        let db = if path.exists() {
            PickleDb::load(path, PickleDbDumpPolicy::AutoDump, SerializationMethod::Json)
                .unwrap_or_else(|e| {
                    warn!("Job store {} unreadable ({}), starting empty", path.display(), e);
                    PickleDb::new(path, PickleDbDumpPolicy::AutoDump, SerializationMethod::Json)
                })
        } else {
            PickleDb::new(path, PickleDbDumpPolicy::AutoDump, SerializationMethod::Json)
        };
        let mut store = Self { db };
        store.probe()?;
        Ok(store)
    }

    /// Open an existing store without ever writing back to disk.
    pub fn read_only(path: &Path) -> Result<Self, ControllerError> {
        let db = PickleDb::load_read_only(path, SerializationMethod::Json)
            .map_err(|e| ControllerError::Store(format!("load {}: {}", path.display(), e)))?;
        Ok(Self { db })
    }

    fn probe(&mut self) -> Result<(), ControllerError> {
        self.db
            .set(PROBE_KEY, &"ok")
            .and_then(|_| self.db.rem(PROBE_KEY))
            .map(|_| ())
            .map_err(|e| ControllerError::Store(format!("self-test failed: {}", e)))
    }

    pub fn put(&mut self, pin: PinId, fire_at_ms: i64) -> Result<(), ControllerError> {
        self.db
            .set(&pin.to_string(), &fire_at_ms.to_string())
            .map_err(|e| ControllerError::Store(format!("put pin {}: {}", pin, e)))
    }

    /// Fire time for `pin`. Unparseable entries read as no job.
    pub fn get(&self, pin: PinId) -> Option<i64> {
        let key = pin.to_string();
        if !self.db.exists(&key) {
            return None;
        }
        let parsed = self
            .db
            .get::<String>(&key)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .or_else(|| self.db.get::<i64>(&key));
        if parsed.is_none() {
            warn!("Ignoring corrupt scheduled job for pin {}", pin);
        }
        parsed
    }

    /// Returns false when no job was stored for `pin`.
    pub fn remove(&mut self, pin: PinId) -> Result<bool, ControllerError> {
        self.db
            .rem(&pin.to_string())
            .map_err(|e| ControllerError::Store(format!("remove pin {}: {}", pin, e)))
    }

    /// All readable jobs, ordered by pin.
    pub fn pending(&self) -> Vec<ScheduledJob> {
        let mut jobs: Vec<ScheduledJob> = self
            .db
            .get_all()
            .into_iter()
            .filter(|key| key != PROBE_KEY)
            .filter_map(|key| match key.parse::<PinId>() {
                Ok(pin) => self.get(pin).map(|fire_at_ms| ScheduledJob { pin, fire_at_ms }),
                Err(_) => {
                    warn!("Ignoring scheduled job with invalid key '{}'", key);
                    None
                }
            })
            .collect();
        jobs.sort_by_key(|job| job.pin);
        jobs
    }
}

/// Delay before a job read at boot fires: the time left, but never less
/// than [`MIN_REPLAY_DELAY`].
pub fn replay_delay(fire_at_ms: i64, now_ms: i64) -> Duration {
    remaining_until(fire_at_ms, now_ms).max(MIN_REPLAY_DELAY)
}
