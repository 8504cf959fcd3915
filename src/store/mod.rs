//! Local snapshot and report cache.
//!
//! Snapshots and reports persist as JSON blobs in SQLite so the `report`
//! subcommand can re-render the last run without new API calls and the watch
//! loop can detect unchanged snapshots by content hash.

pub mod migrations;

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::store::migrations::BASE_MIGRATION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Sql,
    Gke,
    Schema,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Gke => "gke",
            Self::Schema => "schema",
        }
    }
}

/// SHA-256 over the canonical JSON encoding; used to detect snapshot churn
/// between watch iterations without a field-by-field diff.
pub fn content_hash<T: Serialize>(value: &T) -> String {
    let canonical = serde_json::to_string(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct SnapshotStore {
    conn: Mutex<Connection>,
}

impl SnapshotStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.lock().unwrap().execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    pub fn insert_snapshot<T: Serialize>(
        &self,
        kind: ResourceKind,
        resource: &str,
        snapshot: &T,
    ) -> Result<()> {
        self.conn.lock().unwrap().execute(
            r#"
INSERT INTO snapshot_history(kind, resource, captured_at, content_hash, snapshot_json)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
            params![
                kind.as_str(),
                resource,
                Utc::now().to_rfc3339(),
                content_hash(snapshot),
                serde_json::to_string(snapshot)?
            ],
        )?;
        Ok(())
    }

    pub fn latest_snapshot_hash(&self, kind: ResourceKind, resource: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
SELECT content_hash
FROM snapshot_history
WHERE kind = ?1 AND resource = ?2
ORDER BY id DESC
LIMIT 1
"#,
        )?;
        let result = stmt.query_row(params![kind.as_str(), resource], |row| {
            row.get::<_, String>(0)
        });
        match result {
            Ok(hash) => Ok(Some(hash)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn insert_report<T: Serialize>(
        &self,
        kind: ResourceKind,
        generated_at: DateTime<Utc>,
        report: &T,
    ) -> Result<()> {
        self.conn.lock().unwrap().execute(
            r#"
INSERT INTO report_history(kind, generated_at, report_json)
VALUES (?1, ?2, ?3)
"#,
            params![
                kind.as_str(),
                generated_at.to_rfc3339(),
                serde_json::to_string(report)?
            ],
        )?;
        Ok(())
    }

    pub fn latest_report<T: DeserializeOwned>(&self, kind: ResourceKind) -> Result<Option<T>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
SELECT report_json
FROM report_history
WHERE kind = ?1
ORDER BY id DESC
LIMIT 1
"#,
        )?;
        let result = stmt.query_row(params![kind.as_str()], |row| row.get::<_, String>(0));
        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
