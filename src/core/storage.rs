use std::collections::HashMap;

use super::identifier::Identifier;

pub type Value = Vec<u8>;

/// A node's local key-value store, keyed by ring identifier.
#[derive(Debug, Default)]
pub struct Storage {
    map: HashMap<Identifier, Value>,
}

impl Storage {
    pub fn new() -> Self {
        Storage {
            map: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: Identifier, value: Value) -> Option<Value> {
        self.map.insert(key, value)
    }

    pub fn get(&self, key: &Identifier) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn remove(&mut self, key: &Identifier) -> Option<Value> {
        self.map.remove(key)
    }

    pub fn contains(&self, key: &Identifier) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = Identifier> + '_ {
        self.map.keys().copied()
    }

    /// Remove and return every entry whose key matches `pred`.
    pub fn drain_where<F>(&mut self, mut pred: F) -> Vec<(Identifier, Value)>
    where
        F: FnMut(Identifier) -> bool,
    {
        let keys: Vec<Identifier> = self.map.keys().copied().filter(|k| pred(*k)).collect();
        keys.into_iter()
            .filter_map(|k| self.map.remove(&k).map(|v| (k, v)))
            .collect()
    }

    pub fn extend(&mut self, entries: Vec<(Identifier, Value)>) {
        self.map.extend(entries);
    }
}
