//! Generic hash table engine - open chaining over an arena of nodes
//!
//! Design: Two views of the same structure:
//! - A bucket array, each bucket holding a count and a singly linked chain
//!   of nodes (open chaining, new nodes linked at the head)
//! - A node arena replenished in chunks, with unused nodes threaded on a
//!   free list through the same link field the chains use
//!
//! Every node is on exactly one list at any time: a bucket chain or the
//! free list. Links are `u32` indices into the arena (`NIL` terminated),
//! never pointers, so a stale reference can at worst read a recycled node.
//!
//! Bucket counts come from a Fibonacci series, bumped to odd: hash
//! functions frequently distribute unevenly around powers of two, and an
//! odd modulus keeps those keys from piling into a few buckets.
//!
//! The engine permits duplicate keys; one-value-per-key semantics belong
//! to the wrappers in `collections`.

mod cursor;
mod policy;


pub use cursor::Cursor;
pub use policy::{IntPolicy, NonOwnedValuePolicy, ScalarKey, TablePolicy, ValuePolicy, ValueSetPolicy};

use tracing::debug;

use crate::error::AllocError;

/// Chain terminator / empty free list.
const NIL: u32 = u32::MAX;

/// Default ceiling on nodes added per replenishment chunk; the ramp grows
/// chunks up to this, then every further chunk is exactly this size.
pub const DEFAULT_CHUNK_LIMIT: usize = 300_000;

/// Position of a live node inside a table's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(u32);

struct Node<K, V> {
    /// Next node in this node's current list (bucket chain or free list).
    next: u32,
    key: Option<K>,
    value: Option<V>,
}

#[derive(Clone, Copy)]
struct Bucket {
    count: u32,
    first: u32,
}

impl Bucket {
    const EMPTY: Bucket = Bucket {
        count: 0,
        first: NIL,
    };
}

/// Creation-time table configuration.
#[derive(Debug, Clone, Copy)]
pub struct TableConfig {
    /// Expected entry count; sizes the initial bucket array and node arena.
    pub capacity: usize,
    /// Chunk growth ceiling in nodes.
    pub chunk_limit: usize,
    /// Skip release calls on reset and teardown (unmanaged content only).
    pub no_clean: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            chunk_limit: DEFAULT_CHUNK_LIMIT,
            no_clean: false,
        }
    }
}

/// The table engine, parameterized by a capability policy and an optional
/// caller-defined side channel `X` carried alongside the table.
pub struct Table<P: TablePolicy, X = ()> {
    policy: P,
    buckets: Vec<Bucket>,
    nodes: Vec<Node<P::Key, P::Value>>,
    free_head: u32,
    node_count: usize,
    chunk_sizes: Vec<u32>,
    chunk_limit: usize,
    no_clean: bool,
    extra: X,
}

impl<P: TablePolicy> Table<P> {
    /// Empty table with default configuration.
    pub fn new(policy: P) -> Self {
        Self::with_capacity(policy, 0)
    }

    /// Empty table sized for an expected entry count.
    pub fn with_capacity(policy: P, capacity: usize) -> Self {
        Self::with_config(
            policy,
            TableConfig {
                capacity,
                ..TableConfig::default()
            },
        )
    }

    /// Empty table with explicit configuration.
    pub fn with_config(policy: P, config: TableConfig) -> Self {
        Self::with_extra(policy, config, ())
    }
}

impl<P: TablePolicy, X> Table<P, X> {
    /// Empty table carrying a caller-defined side channel.
    pub fn with_extra(policy: P, config: TableConfig, extra: X) -> Self {
        let mut table = Self {
            policy,
            buckets: Vec::new(),
            nodes: Vec::new(),
            free_head: NIL,
            node_count: 0,
            chunk_sizes: Vec::new(),
            chunk_limit: config.chunk_limit.max(1),
            no_clean: config.no_clean,
            extra,
        };
        table.right_size(config.capacity);
        if let Err(err) = table.more_nodes(config.capacity) {
            // Degrade: start with an empty free list, insert will retry.
            debug!(event = "initial_chunk_skipped", %err);
        }
        table
    }

    /// Live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.node_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// Current bucket array size.
    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of chunk replenishments so far.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunk_sizes.len()
    }

    /// Total nodes in the arena, free or live.
    #[inline]
    pub fn arena_capacity(&self) -> usize {
        self.nodes.len()
    }

    /// The table's capability policy.
    #[inline]
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Caller-defined side channel.
    #[inline]
    pub fn extra(&self) -> &X {
        &self.extra
    }

    #[inline]
    pub fn extra_mut(&mut self) -> &mut X {
        &mut self.extra
    }

    /// Key of a live node.
    pub fn key(&self, node: NodeRef) -> Option<&P::Key> {
        self.nodes.get(node.0 as usize)?.key.as_ref()
    }

    /// Value of a live node.
    pub fn value(&self, node: NodeRef) -> Option<&P::Value> {
        self.nodes.get(node.0 as usize)?.value.as_ref()
    }

    /// Replace a live node's value: the new value is retained, the old one
    /// released. Returns false for a dead node.
    pub fn set_value(&mut self, node: NodeRef, value: P::Value) -> bool {
        let idx = node.0 as usize;
        match self.nodes.get(idx) {
            Some(n) if n.key.is_some() => {}
            _ => return false,
        }
        self.policy.retain_value(&value);
        let old = self.nodes[idx].value.replace(value);
        if let Some(old) = old {
            self.policy.release_value(&old);
        }
        true
    }

    /// Find the first node matching `key`, or None (a miss is normal
    /// control flow, not an error).
    pub fn lookup(&self, key: &P::Key) -> Option<NodeRef> {
        if self.node_count == 0 {
            return None;
        }
        let bucket = self.pick_bucket(self.policy.hash(key));
        self.find_in_chain(self.buckets[bucket].first, key)
    }

    /// Continue a chain scan past `after`, for enumerating duplicate keys.
    pub fn lookup_from(&self, after: NodeRef, key: &P::Key) -> Option<NodeRef> {
        let next = self.nodes.get(after.0 as usize)?.next;
        self.find_in_chain(next, key)
    }

    /// Retaining insert. Duplicate keys are permitted: the new node is
    /// linked at the head of its chain, shadowing older matches.
    ///
    /// On growth failure nothing is retained and the table is unchanged.
    pub fn insert(&mut self, key: P::Key, value: P::Value) -> Result<NodeRef, AllocError> {
        self.reserve_node()?;
        self.policy.retain_key(&key);
        self.policy.retain_value(&value);
        Ok(self.link_new_node(key, value))
    }

    /// Insert without retaining: ownership of `key` and `value` transfers
    /// to the table as-is.
    pub fn insert_no_retain(&mut self, key: P::Key, value: P::Value) -> Result<NodeRef, AllocError> {
        self.reserve_node()?;
        Ok(self.link_new_node(key, value))
    }

    /// Remove the first node matching `key`, releasing its contents.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, key: &P::Key) -> bool {
        if self.node_count == 0 {
            return false;
        }
        let bucket = self.pick_bucket(self.policy.hash(key));
        match self.find_in_chain(self.buckets[bucket].first, key) {
            Some(node) => {
                self.unlink_node(bucket, node.0);
                self.node_count -= 1;
                self.free_node(node.0);
                true
            }
            None => false,
        }
    }

    /// Remove a node by position (the enumeration-supporting removal).
    /// Returns false if the node is not live in this table.
    pub fn remove_node(&mut self, node: NodeRef) -> bool {
        let idx = node.0;
        let hash = match self.nodes.get(idx as usize).and_then(|n| n.key.as_ref()) {
            Some(key) => self.policy.hash(key),
            None => return false,
        };
        let bucket = self.pick_bucket(hash);

        let mut cur = self.buckets[bucket].first;
        while cur != NIL && cur != idx {
            cur = self.nodes[cur as usize].next;
        }
        if cur != idx {
            return false;
        }

        self.unlink_node(bucket, idx);
        self.node_count -= 1;
        self.free_node(idx);
        true
    }

    /// Grow the bucket array when the load factor calls for it. Growth
    /// failure here is swallowed: the table keeps working, just more
    /// loaded.
    pub fn right_size(&mut self, capacity: usize) {
        if 3 * capacity >= 4 * self.buckets.len() {
            let wanted = (3 * capacity) / 4 + 1;
            if let Err(err) = self.resize(wanted) {
                debug!(event = "right_size_skipped", wanted, %err);
            }
        }
    }

    /// Rebuild the bucket array for `new_capacity` entries and rehash every
    /// node into it. All-at-once; on failure the table is untouched.
    pub fn resize(&mut self, new_capacity: usize) -> Result<(), AllocError> {
        let size = next_table_size(new_capacity);
        let mut new_buckets: Vec<Bucket> = Vec::new();
        new_buckets
            .try_reserve_exact(size)
            .map_err(|_| AllocError::Buckets { buckets: size })?;
        new_buckets.resize(size, Bucket::EMPTY);

        let old_buckets = std::mem::replace(&mut self.buckets, new_buckets);
        crate::logging::log_table_resize(old_buckets.len(), size);

        // Relink each chain oldest-first so head insertion reproduces the
        // original order; lookups keep finding the most recent insert for
        // a key across resizes.
        let mut chain: Vec<u32> = Vec::new();
        for bucket in &old_buckets {
            chain.clear();
            let mut idx = bucket.first;
            while idx != NIL {
                chain.push(idx);
                idx = self.nodes[idx as usize].next;
            }
            for &idx in chain.iter().rev() {
                let hash = match self.nodes[idx as usize].key.as_ref() {
                    Some(key) => self.policy.hash(key),
                    // Free nodes are never on a chain.
                    None => 0,
                };
                let target = self.pick_bucket(hash);
                self.link_node(target, idx);
            }
        }
        Ok(())
    }

    /// Soft reset: release every pair (unless configured no-clean), splice
    /// all chains onto the free list in one pass, zero the buckets. Bucket
    /// array and arena stay allocated for reuse.
    pub fn reset(&mut self) {
        if self.node_count == 0 {
            return;
        }

        let mut head = NIL;
        let mut tail = NIL;
        for bi in 0..self.buckets.len() {
            let mut idx = self.buckets[bi].first;
            if idx == NIL {
                continue;
            }
            // Bridge the previous chain's tail to this chain's head; the
            // intra-chain links are already what the free list needs.
            if head == NIL {
                head = idx;
            } else {
                self.nodes[tail as usize].next = idx;
            }
            loop {
                let (key, value, next) = {
                    let node = &mut self.nodes[idx as usize];
                    (node.key.take(), node.value.take(), node.next)
                };
                if !self.no_clean {
                    if let Some(key) = key {
                        self.policy.release_key(&key);
                    }
                    if let Some(value) = value {
                        self.policy.release_value(&value);
                    }
                }
                if next == NIL {
                    tail = idx;
                    break;
                }
                idx = next;
            }
            self.buckets[bi] = Bucket::EMPTY;
        }

        if tail != NIL {
            self.nodes[tail as usize].next = self.free_head;
            self.free_head = head;
        }
        self.node_count = 0;
    }

    /// Enumerator positioned at the table's first live node.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self)
    }

    #[inline]
    fn pick_bucket(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    fn find_in_chain(&self, mut idx: u32, key: &P::Key) -> Option<NodeRef> {
        while idx != NIL {
            let node = &self.nodes[idx as usize];
            if let Some(k) = node.key.as_ref() {
                if self.policy.equal(k, key) {
                    return Some(NodeRef(idx));
                }
            }
            idx = node.next;
        }
        None
    }

    /// Make sure the free list is non-empty, replenishing by chunk.
    fn reserve_node(&mut self) -> Result<(), AllocError> {
        if self.free_head != NIL {
            return Ok(());
        }
        let required = if self.node_count < self.chunk_limit {
            0
        } else {
            self.chunk_limit
        };
        self.more_nodes(required)
    }

    /// Append one chunk of free nodes to the arena. `required == 0` means
    /// pick the chunk size: the first chunk matches the bucket count, later
    /// ones ramp with the live node count until the configured ceiling.
    fn more_nodes(&mut self, required: usize) -> Result<(), AllocError> {
        let chunk = if required == 0 {
            if self.chunk_sizes.is_empty() {
                self.buckets.len().max(2)
            } else {
                ((self.node_count >> 2) + 1) << 1
            }
        } else {
            required
        };

        if self.nodes.len() + chunk >= NIL as usize {
            return Err(AllocError::Nodes { nodes: chunk });
        }
        self.nodes
            .try_reserve(chunk)
            .map_err(|_| AllocError::Nodes { nodes: chunk })?;

        let base = self.nodes.len() as u32;
        for i in 0..chunk {
            let next = if i + 1 == chunk {
                self.free_head
            } else {
                base + i as u32 + 1
            };
            self.nodes.push(Node {
                next,
                key: None,
                value: None,
            });
        }
        self.free_head = base;
        self.chunk_sizes.push(chunk as u32);
        crate::logging::log_chunk_grow(chunk, self.chunk_sizes.len());
        Ok(())
    }

    /// Take the head of the free list (non-empty after `reserve_node`),
    /// fill it, size-check against the pre-insert count, and link it in.
    fn link_new_node(&mut self, key: P::Key, value: P::Value) -> NodeRef {
        let hash = self.policy.hash(&key);

        let idx = self.free_head;
        self.free_head = self.nodes[idx as usize].next;
        {
            let node = &mut self.nodes[idx as usize];
            node.next = NIL;
            node.key = Some(key);
            node.value = Some(value);
        }

        // Load-factor check uses the current count, not the post-insert
        // count: a resize heuristic, not a capacity guarantee.
        self.right_size(self.node_count);

        let bucket = self.pick_bucket(hash);
        self.link_node(bucket, idx);
        self.node_count += 1;
        NodeRef(idx)
    }

    fn link_node(&mut self, bucket: usize, idx: u32) {
        let first = self.buckets[bucket].first;
        self.nodes[idx as usize].next = first;
        let b = &mut self.buckets[bucket];
        b.first = idx;
        b.count += 1;
    }

    fn unlink_node(&mut self, bucket: usize, idx: u32) {
        let first = self.buckets[bucket].first;
        if first == idx {
            self.buckets[bucket].first = self.nodes[idx as usize].next;
        } else {
            let mut prev = first;
            while self.nodes[prev as usize].next != idx {
                prev = self.nodes[prev as usize].next;
            }
            self.nodes[prev as usize].next = self.nodes[idx as usize].next;
        }
        self.buckets[bucket].count -= 1;
        self.nodes[idx as usize].next = NIL;
    }

    /// Release a node's contents and thread it back onto the free list.
    fn free_node(&mut self, idx: u32) {
        let (key, value) = {
            let node = &mut self.nodes[idx as usize];
            (node.key.take(), node.value.take())
        };
        self.nodes[idx as usize].next = self.free_head;
        self.free_head = idx;
        if let Some(key) = key {
            self.policy.release_key(&key);
        }
        if let Some(value) = value {
            self.policy.release_value(&value);
        }
    }
}

impl<P, X> Table<P, X>
where
    P: TablePolicy,
    P::Key: ScalarKey,
{
    /// Specialized lookup for keys that are their own hash: skips the
    /// policy's hash and equality calls entirely.
    pub fn lookup_scalar(&self, key: P::Key) -> Option<NodeRef> {
        if self.node_count == 0 {
            return None;
        }
        let raw = key.raw();
        let bucket = (raw % self.buckets.len() as u64) as usize;
        let mut idx = self.buckets[bucket].first;
        while idx != NIL {
            let node = &self.nodes[idx as usize];
            if let Some(k) = node.key.as_ref() {
                if k.raw() == raw {
                    return Some(NodeRef(idx));
                }
            }
            idx = node.next;
        }
        None
    }
}

impl<P: TablePolicy, X> Drop for Table<P, X> {
    fn drop(&mut self) {
        // Full teardown: release everything, then the arena and bucket
        // array fall with the struct.
        self.reset();
    }
}

/// Smallest Fibonacci number at or above `capacity`, bumped to odd.
fn next_table_size(capacity: usize) -> usize {
    let mut size: usize = 1;
    let mut old: usize = 1;
    while size < capacity {
        let tmp = old;
        old = size;
        size += tmp;
    }
    if size % 2 == 0 {
        size += 1;
    }
    size
}
