//! MultiMap - the engine's duplicate-key behavior as a named type
//!
//! Where `Dict` replaces, this appends: one key may carry any number of
//! values. The newest insert for a key shadows older ones on single-value
//! lookup (chains are last-in first-out).

use crate::error::AllocError;
use crate::object::Value;
use crate::table::{Table, ValuePolicy};

/// A map permitting multiple values per key.
pub struct MultiMap {
    table: Table<ValuePolicy>,
}

impl MultiMap {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: Table::with_capacity(ValuePolicy, capacity),
        }
    }

    /// Append a pair; existing entries for the key are kept.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), AllocError> {
        self.table.insert(key, value).map(|_| ())
    }

    /// Most recent value inserted for `key`.
    pub fn get(&self, key: &Value) -> Option<Value> {
        let node = self.table.lookup(key)?;
        self.table.value(node).copied()
    }

    /// Every value stored for `key`, newest first.
    pub fn get_all(&self, key: &Value) -> Vec<Value> {
        let mut out = Vec::new();
        let mut node = self.table.lookup(key);
        while let Some(n) = node {
            if let Some(value) = self.table.value(n) {
                out.push(*value);
            }
            node = self.table.lookup_from(n, key);
        }
        out
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.table.lookup(key).is_some()
    }

    /// Remove the most recent entry for `key`; returns whether one existed.
    pub fn remove_one(&mut self, key: &Value) -> bool {
        self.table.remove(key)
    }

    /// Remove every entry for `key`; returns how many were removed.
    pub fn remove_all(&mut self, key: &Value) -> usize {
        let mut removed = 0;
        while self.table.remove(key) {
            removed += 1;
        }
        removed
    }

    /// Total entries, duplicates included.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Release every entry; capacity is retained.
    pub fn clear(&mut self) {
        self.table.reset();
    }
}

impl Default for MultiMap {
    fn default() -> Self {
        Self::new()
    }
}
