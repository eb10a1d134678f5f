//! Error types - recoverable failures surface here
//!
//! Growth failures are returned, not raised: a table that cannot grow keeps
//! its contents and stays usable. Contract violations (stale handles, pool
//! misuse) panic instead - see the heap and autorelease modules.

use thiserror::Error;

/// Storage growth failure inside a table.
///
/// The table remains valid after this error; it is simply unable to grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The node arena could not be extended by a chunk.
    #[error("node arena growth failed ({nodes} nodes requested)")]
    Nodes { nodes: usize },

    /// A new bucket array could not be allocated.
    #[error("bucket array growth failed ({buckets} buckets requested)")]
    Buckets { buckets: usize },
}
