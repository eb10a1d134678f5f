//! Set - unique keys, no values
//!
//! The engine with `Value = ()`: the key-only configuration of the same
//! table. Members are retained while stored.

use crate::error::AllocError;
use crate::object::Value;
use crate::table::{Table, ValueSetPolicy};

/// A unique-member set of tagged items.
pub struct Set {
    table: Table<ValueSetPolicy>,
}

impl Set {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: Table::with_capacity(ValueSetPolicy, capacity),
        }
    }

    /// Add a member. Returns false (without re-adding) if already present.
    pub fn insert(&mut self, member: Value) -> Result<bool, AllocError> {
        if self.table.lookup(&member).is_some() {
            return Ok(false);
        }
        self.table.insert(member, ()).map(|_| true)
    }

    pub fn contains(&self, member: &Value) -> bool {
        self.table.lookup(member).is_some()
    }

    /// Remove a member; returns whether it was present.
    pub fn remove(&mut self, member: &Value) -> bool {
        self.table.remove(member)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Release every member; capacity is retained.
    pub fn clear(&mut self) {
        self.table.reset();
    }

    /// Snapshot of all members, in enumeration order.
    pub fn members(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.table.len());
        let mut cursor = self.table.cursor();
        while let Some(node) = cursor.next(&self.table) {
            if let Some(member) = self.table.key(node) {
                out.push(*member);
            }
        }
        out
    }
}

impl Default for Set {
    fn default() -> Self {
        Self::new()
    }
}
