//! Tests for the object heap and tagged item storage

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::counters;
use super::heap;
use super::{HeapObject, Value};

/// Test object: value identity by id, drop observable through a counter.
struct Token {
    id: u64,
    drops: Arc<AtomicUsize>,
}

impl Token {
    fn boxed(id: u64, drops: &Arc<AtomicUsize>) -> Box<dyn HeapObject> {
        Box::new(Token {
            id,
            drops: Arc::clone(drops),
        })
    }
}

impl HeapObject for Token {
    fn class_name(&self) -> &'static str {
        "Token"
    }

    fn obj_hash(&self) -> u64 {
        self.id
    }

    fn obj_equal(&self, other: &dyn HeapObject) -> bool {
        other
            .as_any()
            .downcast_ref::<Token>()
            .map_or(false, |o| o.id == self.id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn drop_counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[test]
fn test_alloc_starts_at_one() {
    let drops = drop_counter();
    let obj = heap::alloc(Token::boxed(1, &drops));

    assert!(heap::is_live(obj));
    assert_eq!(heap::strong_count(obj), 1);

    heap::release(obj);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(!heap::is_live(obj));
}

#[test]
fn test_retain_release_lifecycle() {
    let drops = drop_counter();
    let obj = heap::alloc(Token::boxed(2, &drops));

    heap::retain(obj);
    heap::retain(obj);
    heap::release(obj);

    // Two retains and one release on top of the initial count: still alive
    // with an effective count of two.
    assert!(heap::is_live(obj));
    assert_eq!(heap::strong_count(obj), 2);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    heap::release(obj);
    assert!(heap::is_live(obj));

    heap::release(obj);
    assert!(!heap::is_live(obj));
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
#[should_panic(expected = "release on dead object handle")]
fn test_double_release_detected() {
    let drops = drop_counter();
    let obj = heap::alloc(Token::boxed(3, &drops));

    heap::release(obj);
    // The handle is stale now; a second release must fail loudly instead of
    // corrupting another object's slot.
    heap::release(obj);
}

#[test]
#[should_panic(expected = "retain on dead object handle")]
fn test_retain_after_free_detected() {
    let drops = drop_counter();
    let obj = heap::alloc(Token::boxed(4, &drops));

    heap::release(obj);
    heap::retain(obj);
}

#[test]
fn test_slot_reuse_bumps_generation() {
    let drops = drop_counter();
    let first = heap::alloc(Token::boxed(5, &drops));
    heap::release(first);

    // Allocate until the freed slot is reused, then confirm the old handle
    // does not alias the new occupant.
    let mut reused = None;
    let mut held = Vec::new();
    for id in 0..64 {
        let obj = heap::alloc(Token::boxed(100 + id, &drops));
        if obj.index() == first.index() {
            reused = Some(obj);
            break;
        }
        held.push(obj);
    }
    if let Some(obj) = reused {
        assert_ne!(obj, first);
        assert!(!heap::is_live(first));
        assert!(heap::is_live(obj));
        heap::release(obj);
    }
    for obj in held {
        heap::release(obj);
    }
}

#[test]
fn test_hash_and_equality_capabilities() {
    let drops = drop_counter();
    let a = heap::alloc(Token::boxed(7, &drops));
    let b = heap::alloc(Token::boxed(7, &drops));
    let c = heap::alloc(Token::boxed(8, &drops));

    assert_eq!(heap::hash(a), 7);
    assert!(heap::equal(a, a)); // identity
    assert!(heap::equal(a, b)); // value equality through the object
    assert!(!heap::equal(a, c));

    heap::release(a);
    heap::release(b);
    heap::release(c);
}

#[test]
fn test_with_object_downcast() {
    let drops = drop_counter();
    let obj = heap::alloc(Token::boxed(9, &drops));

    let id = heap::with_object(obj, |payload| {
        payload.as_any().downcast_ref::<Token>().map(|t| t.id)
    });
    assert_eq!(id, Some(9));

    heap::release(obj);
}

/// An object that owns another handle and releases it from its destructor.
struct Owner {
    child: super::ObjRef,
}

impl HeapObject for Owner {
    fn class_name(&self) -> &'static str {
        "Owner"
    }

    fn obj_hash(&self) -> u64 {
        self.child.index() as u64
    }

    fn obj_equal(&self, _other: &dyn HeapObject) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Owner {
    fn drop(&mut self) {
        heap::release(self.child);
    }
}

#[test]
fn test_destruction_cascades_to_owned_fields() {
    let drops = drop_counter();
    let child = heap::alloc(Token::boxed(10, &drops));
    let owner = heap::alloc(Box::new(Owner { child }));

    heap::release(owner);
    // Releasing the owner must recursively release the child without
    // deadlocking on the heap lock.
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(!heap::is_live(child));
}

mod counter_tests {
    use super::*;

    struct Probe {
        name: &'static str,
    }

    impl HeapObject for Probe {
        fn class_name(&self) -> &'static str {
            self.name
        }

        fn obj_hash(&self) -> u64 {
            0
        }

        fn obj_equal(&self, _other: &dyn HeapObject) -> bool {
            false
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    #[cfg_attr(not(debug_assertions), ignore)]
    fn test_live_instances_track_alloc_dealloc() {
        let name = "CounterProbeAlpha";
        assert_eq!(counters::live_instances(name), 0);

        let a = heap::alloc(Box::new(Probe { name }));
        let b = heap::alloc(Box::new(Probe { name }));
        assert_eq!(counters::live_instances(name), 2);
        assert_eq!(counters::total_instances(name), 2);

        heap::release(a);
        assert_eq!(counters::live_instances(name), 1);

        heap::release(b);
        assert_eq!(counters::live_instances(name), 0);
        assert_eq!(counters::total_instances(name), 2);
    }

    #[test]
    #[cfg_attr(not(debug_assertions), ignore)]
    fn test_snapshot_lists_classes() {
        let name = "CounterProbeBeta";
        let obj = heap::alloc(Box::new(Probe { name }));

        let snapshot = counters::snapshot();
        assert!(snapshot.iter().any(|&(class, live, _)| class == name && live == 1));

        heap::release(obj);
    }
}

mod value_tests {
    use super::*;

    #[test]
    fn test_scalars_are_their_own_hash() {
        assert_eq!(Value::Int(42).hash(), 42);
        assert_eq!(Value::Addr(0x1000).hash(), 0x1000);
        assert_eq!(Value::Float(1.5).hash(), 1.5f64.to_bits());
    }

    #[test]
    fn test_scalar_equality() {
        assert!(Value::Int(7).equal(&Value::Int(7)));
        assert!(!Value::Int(7).equal(&Value::Int(8)));
        assert!(Value::Addr(16).equal(&Value::Addr(16)));
        assert!(Value::Float(2.5).equal(&Value::Float(2.5)));
        // Mixed variants never compare equal, even when bits would.
        assert!(!Value::Int(16).equal(&Value::Addr(16)));
    }

    #[test]
    fn test_object_values_use_heap_capabilities() {
        let drops = drop_counter();
        let a = heap::alloc(Token::boxed(21, &drops));
        let b = heap::alloc(Token::boxed(21, &drops));

        assert_eq!(Value::Obj(a).hash(), 21);
        assert!(Value::Obj(a).equal(&Value::Obj(b)));
        assert!(!Value::Obj(a).equal(&Value::Int(21)));

        heap::release(a);
        heap::release(b);
    }

    #[test]
    fn test_retain_release_touch_only_objects() {
        let drops = drop_counter();
        let obj = heap::alloc(Token::boxed(22, &drops));

        let value = Value::Obj(obj);
        value.retain();
        assert_eq!(heap::strong_count(obj), 2);
        value.release();
        assert_eq!(heap::strong_count(obj), 1);

        // Scalars are inert.
        Value::Int(5).retain();
        Value::Int(5).release();
        Value::Addr(5).release();

        heap::release(obj);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
