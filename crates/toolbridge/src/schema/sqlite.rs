//! SQLite-backed schema cache.
//!
//! Stores one row per tool in `tool_schemas` so templates survive restarts,
//! together with the tool's human-readable description.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use super::{ParameterTemplate, SchemaEntry, SchemaStore};
use crate::error::{BridgeError, BridgeResult};

/// Durable `SchemaStore`.
///
/// The connection sits behind a mutex; every write is a single upsert
/// statement, so a reader observes either the previous or the new row.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the schema database at the given path.
    ///
    /// Creates the table if it doesn't exist and restricts the file to
    /// owner read/write.
    pub fn open(path: &Path) -> BridgeResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BridgeError::Store(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(&conn)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if path.exists() {
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                    .map_err(|e| BridgeError::Store(e.to_string()))?;
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database (used by tests and dry runs).
    pub fn open_in_memory() -> BridgeResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> BridgeResult<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tool_schemas (
                name        TEXT PRIMARY KEY,
                description TEXT,
                parameters  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn conn(&self) -> BridgeResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BridgeError::Store("schema database lock poisoned".to_string()))
    }
}

fn parse_template(tool_id: &str, raw: &str) -> BridgeResult<ParameterTemplate> {
    serde_json::from_str(raw)
        .map_err(|e| BridgeError::Store(format!("corrupt template for '{}': {}", tool_id, e)))
}

impl SchemaStore for SqliteStore {
    fn put(
        &self,
        tool_id: &str,
        template: ParameterTemplate,
        description: Option<&str>,
    ) -> BridgeResult<()> {
        let parameters = serde_json::to_string(&template)
            .map_err(|e| BridgeError::Store(e.to_string()))?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        self.conn()?.execute(
            "INSERT INTO tool_schemas (name, description, parameters, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(name) DO UPDATE SET \
                description = excluded.description, \
                parameters = excluded.parameters, \
                updated_at = excluded.updated_at",
            params![tool_id, description, parameters, updated_at],
        )?;
        log::debug!("Stored schema for {} ({} bytes)", tool_id, parameters.len());
        Ok(())
    }

    fn get(&self, tool_id: &str) -> BridgeResult<Option<Arc<ParameterTemplate>>> {
        let raw: Option<String> = self
            .conn()?
            .query_row(
                "SELECT parameters FROM tool_schemas WHERE name = ?1",
                params![tool_id],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|raw| parse_template(tool_id, &raw).map(Arc::new))
            .transpose()
    }

    fn list(&self) -> BridgeResult<Vec<SchemaEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, description, parameters, updated_at \
             FROM tool_schemas ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (tool_id, description, parameters, updated_at) = row?;
            let template = parse_template(&tool_id, &parameters)?;
            entries.push(SchemaEntry {
                tool_id,
                description,
                template: Arc::new(template),
                updated_at: Some(updated_at),
            });
        }
        Ok(entries)
    }

    fn remove(&self, tool_id: &str) -> BridgeResult<bool> {
        let affected = self
            .conn()?
            .execute("DELETE FROM tool_schemas WHERE name = ?1", params![tool_id])?;
        Ok(affected > 0)
    }

    fn backing(&self) -> &'static str {
        "sqlite"
    }
}
