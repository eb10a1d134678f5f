//! Autorelease pools - deferred release scopes, one stack per thread
//!
//! Design: The pool stack is an explicit thread-local context:
//! - Pools nest; destroying a pool also drains every pool nested inside it
//! - Pending objects sit in a list of fixed-capacity segments, so growth
//!   appends a segment and never moves existing entries
//! - Destroyed pools are parked in a small per-thread cache; the
//!   push/destroy cycle is hot enough to be worth recycling
//!
//! Pools are not heap objects: they cannot be retained, released, or
//! autoreleased, by construction.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{debug, trace, warn};

use crate::object::heap::{self, ObjRef};


/// Entries per pool segment. Segments never grow in place.
const SEGMENT_CAPACITY: usize = 64;

/// Destroyed pools kept around per thread for reuse.
const POOL_CACHE_LIMIT: usize = 8;

/// Process-wide ceiling on objects in a single pool. Exceeding it is a
/// contract violation (an autorelease storm), not a growth request.
static POOL_COUNT_THRESHOLD: AtomicUsize = AtomicUsize::new(usize::MAX);

/// Debug switch: when false, drains discard pending objects without
/// sending release.
static RELEASE_ENABLED: AtomicBool = AtomicBool::new(true);

/// One fixed-capacity segment of pending objects.
struct Segment {
    items: Vec<ObjRef>,
}

impl Segment {
    fn new() -> Self {
        Self {
            items: Vec::with_capacity(SEGMENT_CAPACITY),
        }
    }
}

/// A single pool: segments plus occupancy.
struct Pool {
    serial: u64,
    segments: Vec<Segment>,
    count: usize,
}

impl Pool {
    fn new(serial: u64) -> Self {
        Self {
            serial,
            segments: Vec::new(),
            count: 0,
        }
    }

    fn add(&mut self, obj: ObjRef) {
        if self
            .segments
            .last()
            .map_or(true, |seg| seg.items.len() == SEGMENT_CAPACITY)
        {
            self.segments.push(Segment::new());
        }
        // Last segment exists and has room after the check above.
        if let Some(seg) = self.segments.last_mut() {
            seg.items.push(obj);
        }
        self.count += 1;
    }

    /// Move every pending object into `out`, newest first, keeping segment
    /// allocations for reuse.
    fn drain_into(&mut self, out: &mut Vec<ObjRef>) {
        for seg in self.segments.iter_mut().rev() {
            out.extend(seg.items.drain(..).rev());
        }
        self.count = 0;
    }

    fn occurrences_of(&self, obj: ObjRef) -> usize {
        self.segments
            .iter()
            .map(|seg| seg.items.iter().filter(|&&o| o == obj).count())
            .sum()
    }
}

/// Identifies one pushed pool. Stale tokens (the pool was already destroyed
/// by an enclosing pool) are detected and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolToken {
    depth: usize,
    serial: u64,
}

/// Per-thread pool state: the stack, the recycle cache, and the lifetime
/// autorelease counter.
struct ThreadPools {
    stack: Vec<Pool>,
    cache: Vec<Pool>,
    next_serial: u64,
    total_autoreleased: u64,
}

impl ThreadPools {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            cache: Vec::new(),
            next_serial: 0,
            total_autoreleased: 0,
        }
    }

    /// Resolve a token to a live stack depth, or None if that pool is gone.
    fn resolve(&self, token: PoolToken) -> Option<usize> {
        match self.stack.get(token.depth) {
            Some(pool) if pool.serial == token.serial => Some(token.depth),
            _ => None,
        }
    }

    /// Pop pools down to (exclusive) `keep_depth`, draining each into `out`
    /// and recycling the allocations.
    fn pop_down_to(&mut self, keep_depth: usize, out: &mut Vec<ObjRef>) {
        while self.stack.len() > keep_depth {
            if let Some(mut pool) = self.stack.pop() {
                pool.drain_into(out);
                if self.cache.len() < POOL_CACHE_LIMIT {
                    self.cache.push(pool);
                }
            }
        }
    }
}

impl Drop for ThreadPools {
    fn drop(&mut self) {
        // Thread exit: everything still pending gets its deferred release.
        let mut pending = Vec::new();
        self.pop_down_to(0, &mut pending);
        release_all(pending);
    }
}

thread_local! {
    static CONTEXT: RefCell<ThreadPools> = RefCell::new(ThreadPools::new());
}

fn release_all(pending: Vec<ObjRef>) {
    let enabled = RELEASE_ENABLED.load(Ordering::Relaxed);
    for obj in pending {
        if enabled {
            heap::release(obj);
        }
    }
}

/// Push a new pool; it becomes the thread's current pool.
pub fn push() -> PoolToken {
    CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        let serial = ctx.next_serial;
        ctx.next_serial += 1;
        let pool = match ctx.cache.pop() {
            Some(mut pool) => {
                pool.serial = serial;
                pool
            }
            None => Pool::new(serial),
        };
        ctx.stack.push(pool);
        let depth = ctx.stack.len() - 1;
        trace!(event = "pool_push", depth, serial);
        PoolToken { depth, serial }
    })
}

/// Register one deferred release with the thread's current pool.
///
/// With no pool on the thread this is a contract violation in debug builds;
/// release builds log a warning and leak the reference.
pub fn autorelease(obj: ObjRef) {
    let threshold = POOL_COUNT_THRESHOLD.load(Ordering::Relaxed);
    CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        ctx.total_autoreleased += 1;
        match ctx.stack.last_mut() {
            Some(pool) => {
                if pool.count >= threshold {
                    crate::logging::log_contract_violation("autorelease", obj.index());
                    panic!(
                        "autorelease pool overflow: {} objects in one pool (threshold {})",
                        pool.count, threshold
                    );
                }
                pool.add(obj);
            }
            None => {
                if cfg!(debug_assertions) {
                    panic!("autorelease with no pool on this thread");
                }
                warn!(
                    event = "autorelease_without_pool",
                    slot = obj.index(),
                    "object leaked: no autorelease pool on this thread"
                );
            }
        }
    });
}

/// Release everything the pool holds, draining and destroying any pools
/// nested inside it first. The pool itself survives and stays usable.
pub fn empty(token: PoolToken) {
    let pending = CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        let depth = match ctx.resolve(token) {
            Some(depth) => depth,
            None => return Vec::new(),
        };
        let mut pending = Vec::new();
        ctx.pop_down_to(depth + 1, &mut pending);
        ctx.stack[depth].drain_into(&mut pending);
        pending
    });
    crate::logging::log_pool_drain(token.depth, pending.len());
    release_all(pending);
}

/// Empty the pool, pop it, and restore its parent as the current pool. The
/// pool allocation is parked for reuse.
///
/// A token whose pool was already destroyed (it was nested inside a pool
/// that went away) is a logged no-op.
pub fn destroy(token: PoolToken) {
    let pending = CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        let depth = match ctx.resolve(token) {
            Some(depth) => depth,
            None => {
                debug!(event = "pool_destroy_stale", depth = token.depth);
                return Vec::new();
            }
        };
        let mut pending = Vec::new();
        ctx.pop_down_to(depth, &mut pending);
        pending
    });
    crate::logging::log_pool_drain(token.depth, pending.len());
    release_all(pending);
}

/// Destroy every pool on the calling thread. Called automatically when the
/// thread's state drops at thread exit.
pub fn drain_thread() {
    let pending = CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        let mut pending = Vec::new();
        ctx.pop_down_to(0, &mut pending);
        pending
    });
    release_all(pending);
}

/// Nesting depth of the current pool, if any.
pub fn current_depth() -> Option<usize> {
    CONTEXT.with(|ctx| ctx.borrow().stack.len().checked_sub(1))
}

/// Number of objects pending in the current pool.
pub fn autorelease_count() -> usize {
    CONTEXT.with(|ctx| ctx.borrow().stack.last().map_or(0, |pool| pool.count))
}

/// Occurrences of one object across every pool on this thread.
///
/// Slow (full scan); intended for debugging.
pub fn autorelease_count_for_object(obj: ObjRef) -> usize {
    CONTEXT.with(|ctx| {
        ctx.borrow()
            .stack
            .iter()
            .map(|pool| pool.occurrences_of(obj))
            .sum()
    })
}

/// Objects autoreleased on this thread since it started (or since the last
/// reset).
pub fn total_autoreleased() -> u64 {
    CONTEXT.with(|ctx| ctx.borrow().total_autoreleased)
}

/// Reset the thread's lifetime autorelease counter.
pub fn reset_total_autoreleased() {
    CONTEXT.with(|ctx| ctx.borrow_mut().total_autoreleased = 0);
}

/// Drop the thread's cached pool allocations.
pub fn free_cache() {
    CONTEXT.with(|ctx| ctx.borrow_mut().cache.clear());
}

/// Cap the number of objects a single pool may hold before `autorelease`
/// panics. Default is effectively unlimited.
pub fn set_pool_count_threshold(threshold: usize) {
    POOL_COUNT_THRESHOLD.store(threshold, Ordering::Relaxed);
}

/// The configured single-pool ceiling.
pub fn pool_count_threshold() -> usize {
    POOL_COUNT_THRESHOLD.load(Ordering::Relaxed)
}

/// Debug switch: disable to make drains discard without releasing.
pub fn set_release_enabled(enabled: bool) {
    RELEASE_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Whether drains currently send release.
pub fn release_enabled() -> bool {
    RELEASE_ENABLED.load(Ordering::Relaxed)
}

/// RAII surface over push/destroy.
///
/// ```
/// use bedrock_runtime::autorelease::AutoreleasePool;
///
/// let pool = AutoreleasePool::new();
/// // ... autorelease temporaries ...
/// drop(pool); // everything pending is released here
/// ```
pub struct AutoreleasePool {
    token: PoolToken,
}

impl AutoreleasePool {
    /// Push a new pool for the current scope.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self { token: push() }
    }

    /// Token of the underlying pool.
    pub fn token(&self) -> PoolToken {
        self.token
    }

    /// Release everything pending without ending the scope.
    pub fn empty(&self) {
        empty(self.token);
    }
}

impl Drop for AutoreleasePool {
    fn drop(&mut self) {
        destroy(self.token);
    }
}
