//! SQLite storage backend for trellis

use super::traits::{OpenStore, RequirementStore, StorageError, StorageResult};
use crate::fix::ChangeSet;
use crate::graph::{ReqId, Requirement, RequirementSet};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed requirement store
///
/// Each record is one JSON row keyed by id, with type and status copied
/// into columns for ad-hoc queries. Change sets are logged the same way so
/// an applied set can be rolled back by a later process.
/// Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Requirement records
            CREATE TABLE IF NOT EXISTS requirements (
                id TEXT PRIMARY KEY,
                req_type TEXT NOT NULL,
                status TEXT NOT NULL,
                body_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_requirements_type
                ON requirements(req_type);

            -- Change set log
            CREATE TABLE IF NOT EXISTS change_sets (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                body_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_change_sets_created
                ON change_sets(created_at);

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn upsert_row(conn: &Connection, requirement: &Requirement) -> StorageResult<()> {
        let body = serde_json::to_string(requirement)?;
        conn.execute(
            r#"
            INSERT INTO requirements (id, req_type, status, body_json)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                req_type = excluded.req_type,
                status = excluded.status,
                body_json = excluded.body_json
            "#,
            params![
                requirement.id.as_str(),
                requirement.req_type.as_str(),
                requirement.status.as_str(),
                body,
            ],
        )?;
        Ok(())
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RequirementStore for SqliteStore {
    // === Requirement Operations ===

    fn get_all(&self) -> StorageResult<RequirementSet> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT body_json FROM requirements ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut records = RequirementSet::new();
        for row in rows {
            let requirement: Requirement = serde_json::from_str(&row?)?;
            records.insert(requirement.id.clone(), requirement);
        }
        Ok(records)
    }

    fn get_one(&self, id: &ReqId) -> StorageResult<Option<Requirement>> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM requirements WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn upsert(&self, requirement: &Requirement) -> StorageResult<()> {
        let conn = self.lock()?;
        Self::upsert_row(&conn, requirement)
    }

    fn replace_all(&self, records: &RequirementSet) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existing: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM requirements")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let ids = rows.collect::<Result<Vec<String>, _>>()?;
            ids
        };
        let keep: HashSet<&str> = records.keys().map(|id| id.as_str()).collect();
        for id in existing.iter().filter(|id| !keep.contains(id.as_str())) {
            tx.execute("DELETE FROM requirements WHERE id = ?1", params![id])?;
        }
        for requirement in records.values() {
            Self::upsert_row(&tx, requirement)?;
        }

        tx.commit()?;
        Ok(())
    }

    // === Change Set Log ===

    fn save_change_set(&self, change_set: &ChangeSet) -> StorageResult<()> {
        let conn = self.lock()?;
        let body = serde_json::to_string(change_set)?;
        conn.execute(
            r#"
            INSERT INTO change_sets (id, status, created_at, body_json)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                body_json = excluded.body_json
            "#,
            params![
                change_set.id,
                change_set.status.as_str(),
                change_set.created_at.to_rfc3339(),
                body,
            ],
        )?;
        Ok(())
    }

    fn load_change_set(&self, id: &str) -> StorageResult<Option<ChangeSet>> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM change_sets WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn list_change_sets(&self) -> StorageResult<Vec<ChangeSet>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT body_json FROM change_sets ORDER BY created_at, rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut change_sets = Vec::new();
        for row in rows {
            change_sets.push(serde_json::from_str(&row?)?);
        }
        Ok(change_sets)
    }
}
