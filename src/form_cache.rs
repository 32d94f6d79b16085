use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Settings-form markup already fetched this session, keyed by widget id.
///
/// Entries are never evicted; a fresh session is the only way to drop them.
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct FormCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl FormCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, widget_id: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(widget_id).cloned()
    }

    pub fn contains(&self, widget_id: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.contains_key(widget_id)
    }

    /// Empty markup is not cached so a later expansion retries the fetch.
    pub fn insert(&self, widget_id: &str, markup: String) {
        if widget_id.is_empty() || markup.is_empty() {
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(widget_id.to_string(), markup);
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
