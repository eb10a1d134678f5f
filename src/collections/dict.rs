//! Dict - one value per key over the table engine
//!
//! The engine itself permits duplicate keys; this wrapper is where map
//! semantics live. Existing keys get their value replaced in place (retain
//! new, release old) rather than a second node.

use crate::error::AllocError;
use crate::object::Value;
use crate::table::{Table, ValuePolicy};

/// A unique-key map of tagged items. Keys and values are retained while
/// stored.
pub struct Dict {
    table: Table<ValuePolicy>,
}

impl Dict {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: Table::with_capacity(ValuePolicy, capacity),
        }
    }

    /// Insert or replace. The previous value, if any, is released.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), AllocError> {
        match self.table.lookup(&key) {
            Some(node) => {
                self.table.set_value(node, value);
                Ok(())
            }
            None => self.table.insert(key, value).map(|_| ()),
        }
    }

    /// Value for `key`, if present.
    pub fn get(&self, key: &Value) -> Option<Value> {
        let node = self.table.lookup(key)?;
        self.table.value(node).copied()
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.table.lookup(key).is_some()
    }

    /// Remove the entry for `key`; returns whether one existed.
    pub fn remove(&mut self, key: &Value) -> bool {
        self.table.remove(key)
    }

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

    /// Snapshot of all entries, in enumeration order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        let mut out = Vec::with_capacity(self.table.len());
        let mut cursor = self.table.cursor();
        while let Some(node) = cursor.next(&self.table) {
            if let (Some(key), Some(value)) = (self.table.key(node), self.table.value(node)) {
                out.push((*key, *value));
            }
        }
        out
    }

    /// The underlying engine, for callers that need positional access.
    pub fn table(&self) -> &Table<ValuePolicy> {
        &self.table
    }
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}
