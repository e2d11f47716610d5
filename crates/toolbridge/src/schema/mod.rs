//! Schema cache: tool identifier → last-known parameter template.
//!
//! Two backings share the `SchemaStore` contract:
//! - `MemoryStore`, cleared when the process exits
//! - `SqliteStore`, durable and keeping a description per tool
//!
//! A deployment picks exactly one through `cache.backend` in the config.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{CacheBackend, CacheConfig};
use crate::error::BridgeResult;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Nested parameter shape a tool expects, as learned from a describe call.
///
/// Internal nodes are JSON objects; every other value is a leaf placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterTemplate(Map<String, Value>);

impl ParameterTemplate {
    /// Build a template from a JSON value; only objects qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().cloned().map(Self)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One cached schema, as reported by `SchemaStore::list`.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaEntry {
    pub tool_id: String,
    pub description: Option<String>,
    pub template: Arc<ParameterTemplate>,
    pub updated_at: Option<String>,
}

/// Storage for parameter templates.
///
/// `put` always replaces the previous entry (last write wins, no merge).
/// `get` returns an immutable snapshot: a concurrent `put` for the same id
/// is observed either entirely or not at all.
pub trait SchemaStore: Send + Sync {
    fn put(
        &self,
        tool_id: &str,
        template: ParameterTemplate,
        description: Option<&str>,
    ) -> BridgeResult<()>;

    fn get(&self, tool_id: &str) -> BridgeResult<Option<Arc<ParameterTemplate>>>;

    /// All entries, ordered by tool id.
    fn list(&self) -> BridgeResult<Vec<SchemaEntry>>;

    /// Drop an entry. Returns whether it existed.
    fn remove(&self, tool_id: &str) -> BridgeResult<bool>;

    /// Name of the backing, for logs.
    fn backing(&self) -> &'static str;
}

/// Open the store selected by the cache configuration.
pub fn open_store(config: &CacheConfig) -> BridgeResult<Arc<dyn SchemaStore>> {
    match config.backend {
        CacheBackend::Memory => {
            log::info!("Schema cache: in-memory (cleared on restart)");
            Ok(Arc::new(MemoryStore::new()))
        }
        CacheBackend::Sqlite => {
            let path = config.resolved_path();
            log::info!("Schema cache: SQLite at {}", path.display());
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
    }
}
