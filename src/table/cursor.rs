//! Table enumeration - a cursor independent of the table's borrows
//!
//! The cursor keeps only a bucket index and the arena index of the pending
//! node, so the table stays free for mutation between `next` calls.
//!
//! Contract: a node already returned by `next` may be removed from the
//! table without disturbing the rest of the enumeration - removal only
//! rewrites links behind the cursor. Any other mutation during an
//! enumeration (inserting, resizing, removing a not-yet-visited node)
//! gives unspecified results: entries may be skipped or repeated, though
//! never unsafely.

use super::{NodeRef, Table, TablePolicy, NIL};

/// Restartable-but-fragile enumeration position. Ending an enumeration is
/// simply dropping the cursor; it owns nothing.
#[derive(Debug, Clone)]
pub struct Cursor {
    bucket: usize,
    node: u32,
}

impl Cursor {
    /// Position at the first live node: scan forward from bucket zero.
    pub fn new<P: TablePolicy, X>(table: &Table<P, X>) -> Self {
        let mut cursor = Cursor {
            bucket: 0,
            node: NIL,
        };
        while cursor.bucket < table.buckets.len() {
            let first = table.buckets[cursor.bucket].first;
            if first != NIL {
                cursor.node = first;
                break;
            }
            cursor.bucket += 1;
        }
        cursor
    }

    /// Yield the pending node and pre-advance: within the chain if it
    /// continues, else forward to the next non-empty bucket.
    pub fn next<P: TablePolicy, X>(&mut self, table: &Table<P, X>) -> Option<NodeRef> {
        if self.node == NIL {
            return None;
        }
        let current = self.node;
        let mut next = match table.nodes.get(current as usize) {
            Some(node) => node.next,
            None => NIL,
        };
        if next == NIL {
            while next == NIL && self.bucket + 1 < table.buckets.len() {
                self.bucket += 1;
                next = table.buckets[self.bucket].first;
            }
        }
        self.node = next;
        Some(NodeRef(current))
    }

    /// Bucket index the pending node will come from, if any.
    pub fn bucket<P: TablePolicy, X>(&self, table: &Table<P, X>) -> Option<usize> {
        if self.node == NIL || self.bucket >= table.buckets.len() {
            None
        } else {
            Some(self.bucket)
        }
    }
}
