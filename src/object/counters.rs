//! Per-class live-instance counters - leak diagnosis hooks
//!
//! Every allocation and destruction passes through here. Counting is
//! enabled by default in debug builds only; it can be toggled at runtime.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use once_cell::sync::Lazy;

/// Global counter registry (lock-free concurrent map).
static COUNTERS: Lazy<DashMap<&'static str, ClassCount>> = Lazy::new(DashMap::new);

static ENABLED: AtomicBool = AtomicBool::new(cfg!(debug_assertions));

struct ClassCount {
    live: AtomicUsize,
    total: AtomicU64,
}

/// Initialize counter registry (idempotent).
pub(super) fn init() {
    Lazy::force(&COUNTERS);
}

/// Turn instance counting on or off.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

/// Whether instance counting is currently active.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Creation hook, called by the heap on every allocation.
#[inline]
pub(crate) fn record_alloc(class: &'static str) {
    if !is_enabled() {
        return;
    }
    let entry = COUNTERS.entry(class).or_insert_with(|| ClassCount {
        live: AtomicUsize::new(0),
        total: AtomicU64::new(0),
    });
    entry.live.fetch_add(1, Ordering::Relaxed);
    entry.total.fetch_add(1, Ordering::Relaxed);
}

/// Destruction hook, called by the heap when a retain count reaches zero.
#[inline]
pub(crate) fn record_dealloc(class: &'static str) {
    if !is_enabled() {
        return;
    }
    if let Some(entry) = COUNTERS.get(class) {
        entry.live.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Live instances of one class.
pub fn live_instances(class: &str) -> usize {
    COUNTERS
        .get(class)
        .map(|c| c.live.load(Ordering::Relaxed))
        .unwrap_or(0)
}

/// Lifetime allocation count of one class.
pub fn total_instances(class: &str) -> u64 {
    COUNTERS
        .get(class)
        .map(|c| c.total.load(Ordering::Relaxed))
        .unwrap_or(0)
}

/// Snapshot of (class, live, total) for every class seen so far.
pub fn snapshot() -> Vec<(&'static str, usize, u64)> {
    let mut classes: Vec<_> = COUNTERS
        .iter()
        .map(|entry| {
            (
                *entry.key(),
                entry.live.load(Ordering::Relaxed),
                entry.total.load(Ordering::Relaxed),
            )
        })
        .collect();
    classes.sort_by_key(|&(name, _, _)| name);
    classes
}

/// Forget all recorded classes.
pub fn reset() {
    COUNTERS.clear();
}
