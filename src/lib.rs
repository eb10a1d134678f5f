//! Bedrock Runtime - object runtime core for the framework layer
//!
//! This crate provides the two subsystems everything above it depends on:
//! a reference-counted object heap with deferred release (autorelease
//! pools), and a generic chained-hash table engine with arena node storage
//! that backs the dictionary, set, and lookup-table types.
//!
//! The table engine is parameterized by a capability policy (hash,
//! equality, retain, release) and is not internally synchronized; the heap
//! is global and uses atomic retain counts. Autorelease pools are strictly
//! per-thread.

#![allow(dead_code)]

pub mod autorelease;
pub mod collections;
pub mod error;
pub mod logging;
pub mod object;
pub mod table;

// Re-export core types
pub use autorelease::AutoreleasePool;
pub use collections::{Dict, MultiMap, Set};
pub use error::AllocError;
pub use object::{HeapObject, ObjRef, Value};
pub use table::{Cursor, NodeRef, Table, TableConfig, TablePolicy};

/// Runtime initialization: logging plus the global heap state. Idempotent.
pub fn init() {
    logging::init();
    object::heap::init();
}

/// Per-thread teardown: destroy every autorelease pool still open on the
/// calling thread. Also happens automatically when the thread exits.
pub fn drain_thread() {
    autorelease::drain_thread();
}
