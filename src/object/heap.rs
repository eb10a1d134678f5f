//! Object heap - slot arena with generation-checked handles
//!
//! Design: Reference-counted objects live in a global slot arena:
//! - `ObjRef` is a (index, generation) pair, never a raw pointer
//! - Freed slots are recycled through a free list; each free bumps the
//!   slot's generation so stale handles are caught on every access
//! - Refcount updates are atomic (Relaxed inc, Release dec + Acquire fence
//!   on the zero transition)
//!
//! Payload drop happens outside the arena lock: an object's `Drop` may
//! recursively release other handles without deadlocking.

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::trace;

use super::counters;

/// What a heap-storable object must supply.
///
/// Hash and equality are the only messages the runtime core ever sends to an
/// object; everything else it does with objects is counting and dropping.
///
/// `obj_hash` and `obj_equal` run under the heap's read lock: they may read
/// other objects but must not retain, release, or allocate.
pub trait HeapObject: Any + Send + Sync {
    /// Stable class name, used for live-instance accounting.
    fn class_name(&self) -> &'static str;

    /// Hash of the object's value.
    fn obj_hash(&self) -> u64;

    /// Value equality against another object.
    fn obj_equal(&self, other: &dyn HeapObject) -> bool;

    /// Downcasting escape hatch.
    fn as_any(&self) -> &dyn Any;
}

/// Handle to a heap object (8 bytes, Copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    index: u32,
    generation: u32,
}

impl ObjRef {
    /// Slot index, exposed for diagnostics only.
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }
}

struct Slot {
    generation: u32,
    refcount: AtomicU32,
    payload: Option<Box<dyn HeapObject>>,
}

struct SlotArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl SlotArena {
    const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn slot(&self, handle: ObjRef, op: &str) -> &Slot {
        let slot = self
            .slots
            .get(handle.index as usize)
            .unwrap_or_else(|| dead_handle(op, handle));
        if slot.generation != handle.generation || slot.payload.is_none() {
            dead_handle(op, handle);
        }
        slot
    }
}

/// Global heap state.
static HEAP: Lazy<RwLock<SlotArena>> = Lazy::new(|| RwLock::new(SlotArena::new()));

/// Stale or already-freed handle: refusing to continue beats corrupting a
/// refcount somewhere else.
#[cold]
fn dead_handle(op: &str, handle: ObjRef) -> ! {
    crate::logging::log_contract_violation(op, handle.index);
    panic!(
        "{} on dead object handle (slot {}, generation {})",
        op, handle.index, handle.generation
    );
}

/// Initialize heap subsystem (idempotent).
pub fn init() {
    Lazy::force(&HEAP);
    counters::init();
}

/// Allocate a new object with retain count 1.
pub fn alloc(payload: Box<dyn HeapObject>) -> ObjRef {
    let class = payload.class_name();
    let mut arena = HEAP.write();

    let index = match arena.free.pop() {
        Some(index) => {
            let slot = &mut arena.slots[index as usize];
            slot.refcount.store(1, Ordering::Relaxed);
            slot.payload = Some(payload);
            index
        }
        None => {
            let index = arena.slots.len() as u32;
            arena.slots.push(Slot {
                generation: 0,
                refcount: AtomicU32::new(1),
                payload: Some(payload),
            });
            index
        }
    };
    let generation = arena.slots[index as usize].generation;
    drop(arena);

    counters::record_alloc(class);
    trace!(event = "object_alloc", class, slot = index, count = 1);

    ObjRef { index, generation }
}

/// Increment the retain count (hot path).
#[inline]
pub fn retain(handle: ObjRef) {
    let arena = HEAP.read();
    let slot = arena.slot(handle, "retain");
    let old = slot.refcount.fetch_add(1, Ordering::Relaxed);

    debug_assert!(old > 0, "retain of unreferenced object");
    debug_assert!(old < u32::MAX, "refcount overflow");
}

/// Decrement the retain count, destroying the object on the 1 -> 0
/// transition (hot path, destruction is cold).
#[inline]
pub fn release(handle: ObjRef) {
    let arena = HEAP.read();
    let slot = arena.slot(handle, "release");
    let old = slot.refcount.fetch_sub(1, Ordering::Release);

    debug_assert!(old > 0, "refcount underflow");

    if old == 1 {
        // Synchronize with all previous decrements
        std::sync::atomic::fence(Ordering::Acquire);
        drop(arena);
        destroy(handle);
    }
}

/// Register the object with the calling thread's current autorelease pool
/// for one deferred release.
#[inline]
pub fn autorelease(handle: ObjRef) {
    crate::autorelease::autorelease(handle);
}

/// Take the payload out of its slot and drop it without holding the arena
/// lock, so recursive releases from the payload's `Drop` cannot deadlock.
#[cold]
fn destroy(handle: ObjRef) {
    let payload = {
        let mut arena = HEAP.write();
        let slot = arena
            .slots
            .get_mut(handle.index as usize)
            .unwrap_or_else(|| dead_handle("release", handle));
        if slot.generation != handle.generation {
            dead_handle("release", handle);
        }
        if slot.refcount.load(Ordering::Relaxed) != 0 || slot.payload.is_none() {
            // Lost a race against a concurrent retain; the object lives on.
            return;
        }
        slot.generation = slot.generation.wrapping_add(1);
        let payload = slot.payload.take();
        arena.free.push(handle.index);
        payload
    };

    if let Some(payload) = payload {
        let class = payload.class_name();
        counters::record_dealloc(class);
        trace!(event = "object_dealloc", class, slot = handle.index);
        drop(payload);
    }
}

/// Current retain count (diagnostics).
pub fn strong_count(handle: ObjRef) -> u32 {
    let arena = HEAP.read();
    arena.slot(handle, "strong_count").refcount.load(Ordering::Relaxed)
}

/// Whether the handle still refers to a live object.
pub fn is_live(handle: ObjRef) -> bool {
    let arena = HEAP.read();
    match arena.slots.get(handle.index as usize) {
        Some(slot) => slot.generation == handle.generation && slot.payload.is_some(),
        None => false,
    }
}

/// Hash of the object's value.
pub fn hash(handle: ObjRef) -> u64 {
    let arena = HEAP.read();
    let slot = arena.slot(handle, "hash");
    slot.payload.as_ref().map(|p| p.obj_hash()).unwrap_or(0)
}

/// Equality: identity first, then the objects' own comparison.
pub fn equal(a: ObjRef, b: ObjRef) -> bool {
    if a == b {
        return true;
    }
    let arena = HEAP.read();
    let pa = arena.slot(a, "equal").payload.as_deref();
    let pb = arena.slot(b, "equal").payload.as_deref();
    match (pa, pb) {
        (Some(pa), Some(pb)) => pa.obj_equal(pb),
        _ => false,
    }
}

/// Run a closure against the object's payload.
///
/// The closure runs under the heap's read lock; it must not retain,
/// release, or allocate.
pub fn with_object<R>(handle: ObjRef, f: impl FnOnce(&dyn HeapObject) -> R) -> R {
    let arena = HEAP.read();
    let slot = arena.slot(handle, "with_object");
    match slot.payload.as_deref() {
        Some(payload) => f(payload),
        None => dead_handle("with_object", handle),
    }
}

/// Number of live objects across all classes.
pub fn live_objects() -> usize {
    let arena = HEAP.read();
    arena.slots.len() - arena.free.len()
}
