//! In-process schema cache.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{ParameterTemplate, SchemaEntry, SchemaStore};
use crate::error::{BridgeError, BridgeResult};

/// Volatile `SchemaStore`: a map of `Arc` snapshots behind a `RwLock`.
///
/// `put` swaps the whole `Arc` under the write lock, so readers never see a
/// partially written template.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Arc<ParameterTemplate>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> BridgeError {
    BridgeError::Store("schema cache lock poisoned".to_string())
}

impl SchemaStore for MemoryStore {
    fn put(
        &self,
        tool_id: &str,
        template: ParameterTemplate,
        _description: Option<&str>,
    ) -> BridgeResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(tool_id.to_string(), Arc::new(template));
        Ok(())
    }

    fn get(&self, tool_id: &str) -> BridgeResult<Option<Arc<ParameterTemplate>>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(tool_id).cloned())
    }

    fn list(&self) -> BridgeResult<Vec<SchemaEntry>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        let mut list: Vec<SchemaEntry> = entries
            .iter()
            .map(|(tool_id, template)| SchemaEntry {
                tool_id: tool_id.clone(),
                description: None,
                template: Arc::clone(template),
                updated_at: None,
            })
            .collect();
        list.sort_by(|a, b| a.tool_id.cmp(&b.tool_id));
        Ok(list)
    }

    fn remove(&self, tool_id: &str) -> BridgeResult<bool> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(entries.remove(tool_id).is_some())
    }

    fn backing(&self) -> &'static str {
        "memory"
    }
}
