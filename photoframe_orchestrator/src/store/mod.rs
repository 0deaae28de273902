//! Durable state for the orchestrator.
//!
//! One embedded SQLite file owns everything: devices, override windows,
//! publish history, config plans, and per-device config status. All mutating
//! operations funnel through a single process-wide writer connection guarded
//! by a mutex; cohesive sequences run inside an IMMEDIATE transaction so a
//! device can never observe half of a decision. Readers open independent
//! short-lived connections and rely on WAL snapshot semantics.
//!
//! Nothing in this module performs network I/O, and nothing outside the
//! bounded transaction happens under the writer lock.

pub mod devices;
pub mod history;
pub mod overrides;
pub mod plans;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, anyhow};
use diesel::SqliteConnection;

use crate::db::{connection::connect_sqlite, migrate};

/// Handle to the orchestrator database.
pub struct Store {
    db_path: PathBuf,
    writer: Mutex<SqliteConnection>,
}

impl Store {
    /// Open (creating and migrating if needed) the database at `db_path`.
    pub fn open(db_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create data dir {}", parent.display()))?;
        }
        let url = path_url(&db_path)?;
        migrate::run_sqlite(&url)?;
        let writer = connect_sqlite(&url)?;
        Ok(Self {
            db_path,
            writer: Mutex::new(writer),
        })
    }

    /// Run `f` on the writer connection inside an IMMEDIATE transaction.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&mut SqliteConnection) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut conn = self
            .writer
            .lock()
            .map_err(|_| anyhow!("writer lock poisoned"))?;
        conn.immediate_transaction(f)
    }

    /// Run `f` on a fresh read-only connection.
    pub fn read<T>(
        &self,
        f: impl FnOnce(&mut SqliteConnection) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let url = path_url(&self.db_path)?;
        let mut conn = connect_sqlite(&url)?;
        f(&mut conn)
    }
}

fn path_url(path: &Path) -> anyhow::Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("database path is not valid UTF-8: {}", path.display()))
}
