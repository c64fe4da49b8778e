use super::*;

// =========================================================================
// Arena slot management
// =========================================================================

/// Inserted values are reachable through their handle.
#[test]
fn test_insert_and_get() {
  let mut arena = Arena::new();
  let a = arena.insert(10);
  let b = arena.insert(20);

  assert_eq!(arena.len(), 2);
  assert_eq!(arena.get(a), Some(&10));
  assert_eq!(arena.get(b), Some(&20));
}

/// Removing a value invalidates its handle.
#[test]
fn test_remove_invalidates_handle() {
  let mut arena = Arena::new();
  let a = arena.insert("a");

  assert_eq!(arena.remove(a), Some("a"));
  assert!(arena.get(a).is_none());
  assert!(!arena.contains(a));
  assert_eq!(arena.remove(a), None, "Double remove must be a no-op");
  assert!(arena.is_empty());
}

/// Vacant slots are reused, but with a bumped generation.
#[test]
fn test_slot_reuse_bumps_generation() {
  let mut arena = Arena::new();
  let a = arena.insert(1);
  arena.remove(a);
  let b = arena.insert(2);

  assert_eq!(a.index(), b.index(), "Slot should be reused");
  assert_ne!(a.generation(), b.generation());
  assert_ne!(a, b);
  assert!(arena.get(a).is_none(), "Stale handle must not alias the new value");
  assert_eq!(arena.get(b), Some(&2));
  assert_eq!(arena.slot_count(), 1);
}

/// Stale handles surface as range errors through the checked accessors.
#[test]
fn test_try_get_reports_range() {
  let mut arena = Arena::new();
  let a = arena.insert(5u8);
  arena.remove(a);

  let err = arena.try_get(a, "lookup").unwrap_err();
  assert!(matches!(err, SimError::Range { caller: "lookup", .. }));
  assert!(arena.try_get_mut(a, "lookup").is_err());
}

/// Iteration only visits live values.
#[test]
fn test_iter_skips_vacant() {
  let mut arena = Arena::new();
  let handles: Vec<_> = (0..5).map(|i| arena.insert(i)).collect();
  arena.remove(handles[1]);
  arena.remove(handles[3]);

  let values: Vec<i32> = arena.iter().map(|(_, v)| *v).collect();
  assert_eq!(values, vec![0, 2, 4]);
  assert_eq!(arena.handles().len(), 3);
}
