//! Per-controller map from device id to live background work.
//!
//! Only reachable through the controller's mutex; there is no shared handle.
use std::collections::HashMap;

#[derive(Debug)]
pub struct Registry<W> {
    live: HashMap<String, W>,
}

impl<W> Default for Registry<W> {
    fn default() -> Self {
        Self {
            live: HashMap::new(),
        }
    }
}

impl<W> Registry<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the work registered for `id`.
    pub fn take(&mut self, id: &str) -> Option<W> {
        self.live.remove(id)
    }

    /// Register `work` for `id`. Callers take the previous entry first; a
    /// displaced entry is returned rather than silently dropped.
    pub fn insert(&mut self, id: &str, work: W) -> Option<W> {
        let prev = self.live.insert(id.to_string(), work);
        debug_assert!(prev.is_none(), "registry entry for {id} was not retired");
        prev
    }

    pub fn contains(&self, id: &str) -> bool {
        self.live.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&W> {
        self.live.get(id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.live.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Remove every entry.
    pub fn drain(&mut self) -> Vec<(String, W)> {
        self.live.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_is_idempotent() {
        let mut reg = Registry::new();
        reg.insert("1", 10u32);
        assert_eq!(reg.take("1"), Some(10));
        assert_eq!(reg.take("1"), None);
        assert!(reg.is_empty());
    }

    #[test]
    fn ids_are_sorted_and_drain_empties() {
        let mut reg = Registry::new();
        reg.insert("b", ());
        reg.insert("a", ());
        assert_eq!(reg.ids(), vec!["a".to_string(), "b".to_string()]);
        assert!(reg.contains("a"));
        assert_eq!(reg.drain().len(), 2);
        assert_eq!(reg.len(), 0);
    }
}
