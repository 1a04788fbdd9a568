//! String keyed grouping table.
//!
//! Discovery collects devices under their serial number, and groups
//! same-media-type resources under one equipment type key. Plain
//! lookups go through a [`std::collections::HashMap`]; this wrapper
//! adds the unique-insert contract and the list grouping variant on
//! top, plus draining iteration that hands ownership of the values
//! back to the caller.

use std::collections::hash_map::{self, HashMap};

/// Returned by [`ListHash::insert_unique`] when the key is already
/// present. The table is left unchanged; the rejected value is handed
/// back to the caller.
#[derive(thiserror::Error, Debug)]
#[error("duplicate key '{key}'")]
pub struct DuplicateKey<V> {
    pub key: String,
    pub value: V,
}

pub struct ListHash<V> {
    map: HashMap<String, Vec<V>>,
    len: usize,
}

impl<V> Default for ListHash<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ListHash<V> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            len: 0,
        }
    }

    /// Number of stored values (not keys).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert under a key that must not exist yet (exact, case
    /// sensitive match). A failed insert leaves the table unchanged.
    pub fn insert_unique(&mut self, key: &str, value: V) -> Result<(), DuplicateKey<V>> {
        if self.map.contains_key(key) {
            return Err(DuplicateKey {
                key: key.to_string(),
                value,
            });
        }
        self.map.insert(key.to_string(), vec![value]);
        self.len += 1;
        Ok(())
    }

    /// Append a value under a key, creating the list on first use.
    pub fn list_put(&mut self, key: &str, value: V) {
        match self.map.get_mut(key) {
            Some(list) => list.push(value),
            None => {
                self.map.insert(key.to_string(), vec![value]);
            }
        }
        self.len += 1;
    }

    /// First value stored under `key` (the only one after
    /// `insert_unique`).
    pub fn get(&self, key: &str) -> Option<&V> {
        self.map.get(key).and_then(|list| list.first())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.map.get_mut(key).and_then(|list| list.first_mut())
    }

    /// All values grouped under `key`.
    pub fn get_list(&self, key: &str) -> Option<&[V]> {
        self.map.get(key).map(|list| &list[..])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Detach and return everything stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Vec<V>> {
        let list = self.map.remove(key)?;
        self.len -= list.len();
        Some(list)
    }

    /// Iterate over (key, group) pairs. Iteration order is hash order,
    /// not insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[V])> {
        self.map.iter().map(|(k, v)| (k.as_str(), &v[..]))
    }

    /// Drain the table, transferring ownership of all values.
    pub fn drain(&mut self) -> Drain<'_, V> {
        self.len = 0;
        Drain {
            inner: self.map.drain(),
        }
    }
}

pub struct Drain<'a, V> {
    inner: hash_map::Drain<'a, String, Vec<V>>,
}

impl<'a, V> Iterator for Drain<'a, V> {
    type Item = (String, Vec<V>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<V> IntoIterator for ListHash<V> {
    type Item = (String, Vec<V>);
    type IntoIter = hash_map::IntoIter<String, Vec<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.into_iter()
    }
}
