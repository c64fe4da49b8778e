//! Slot arena with free-list reuse and generational handles.
//!
//! Cells and neighbor links are stored here and addressed by [`Handle`]s
//! instead of owning references. A removed slot bumps its generation, so a
//! handle that outlived its value is detected rather than silently aliasing
//! the slot's next occupant.
//!
//! ```text
//! slots: [ Occupied{gen 0, v} | Vacant{gen 1, next: 3} | Occupied{gen 0, v} | Vacant{gen 2, next: -} ]
//! free_head: 1
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::error::{SimError, SimResult};

/// Generational index into an [`Arena<T>`].
pub struct Handle<T> {
  index: u32,
  generation: u32,
  _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
  fn new(index: u32, generation: u32) -> Self {
    Self {
      index,
      generation,
      _marker: PhantomData,
    }
  }

  /// Placeholder that never matches a live slot.
  pub(crate) const fn dangling() -> Self {
    Self {
      index: u32::MAX,
      generation: u32::MAX,
      _marker: PhantomData,
    }
  }

  /// Slot index (stable for the lifetime of the value).
  #[inline]
  pub fn index(self) -> usize {
    self.index as usize
  }

  /// Generation of the slot when the handle was issued.
  #[inline]
  pub fn generation(self) -> u32 {
    self.generation
  }
}

impl<T> Clone for Handle<T> {
  #[inline]
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
  #[inline]
  fn eq(&self, other: &Self) -> bool {
    self.index == other.index && self.generation == other.generation
  }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.index.hash(state);
    self.generation.hash(state);
  }
}

impl<T> fmt::Debug for Handle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}v{}", self.index, self.generation)
  }
}

enum Slot<T> {
  Occupied { generation: u32, value: T },
  Vacant { generation: u32, next_free: Option<u32> },
}

/// Arena of `T` values with O(1) insert and remove.
pub struct Arena<T> {
  slots: Vec<Slot<T>>,
  free_head: Option<u32>,
  len: usize,
}

impl<T> Arena<T> {
  /// Create an empty arena.
  pub fn new() -> Self {
    Self {
      slots: Vec::new(),
      free_head: None,
      len: 0,
    }
  }

  /// Number of live values.
  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  /// True when no value is stored.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Number of slots ever allocated (upper bound of `Handle::index`).
  #[inline]
  pub fn slot_count(&self) -> usize {
    self.slots.len()
  }

  /// Store a value, reusing a vacant slot when one exists.
  pub fn insert(&mut self, value: T) -> Handle<T> {
    self.len += 1;
    if let Some(index) = self.free_head {
      let slot = &mut self.slots[index as usize];
      let (generation, next_free) = match slot {
        Slot::Vacant {
          generation,
          next_free,
        } => (*generation, *next_free),
        Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
      };
      *slot = Slot::Occupied { generation, value };
      self.free_head = next_free;
      return Handle::new(index, generation);
    }
    let index = self.slots.len() as u32;
    self.slots.push(Slot::Occupied {
      generation: 0,
      value,
    });
    Handle::new(index, 0)
  }

  /// Remove and return the value behind `handle`.
  pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
    let slot = self.slots.get_mut(handle.index())?;
    match slot {
      Slot::Occupied { generation, .. } if *generation == handle.generation => {
        let next_generation = generation.wrapping_add(1);
        let old = std::mem::replace(
          slot,
          Slot::Vacant {
            generation: next_generation,
            next_free: self.free_head,
          },
        );
        self.free_head = Some(handle.index);
        self.len -= 1;
        match old {
          Slot::Occupied { value, .. } => Some(value),
          Slot::Vacant { .. } => None,
        }
      }
      _ => None,
    }
  }

  /// True when `handle` refers to a live value.
  #[inline]
  pub fn contains(&self, handle: Handle<T>) -> bool {
    self.get(handle).is_some()
  }

  /// Shared access.
  #[inline]
  pub fn get(&self, handle: Handle<T>) -> Option<&T> {
    match self.slots.get(handle.index())? {
      Slot::Occupied { generation, value } if *generation == handle.generation => Some(value),
      _ => None,
    }
  }

  /// Exclusive access.
  #[inline]
  pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
    match self.slots.get_mut(handle.index())? {
      Slot::Occupied { generation, value } if *generation == handle.generation => Some(value),
      _ => None,
    }
  }

  /// Shared access, reporting stale or out-of-range handles as range errors.
  #[inline]
  pub fn try_get(&self, handle: Handle<T>, caller: &'static str) -> SimResult<&T> {
    let len = self.slots.len();
    self
      .get(handle)
      .ok_or_else(|| SimError::range(caller, handle.index(), len))
  }

  /// Exclusive access, reporting stale or out-of-range handles as range errors.
  #[inline]
  pub fn try_get_mut(&mut self, handle: Handle<T>, caller: &'static str) -> SimResult<&mut T> {
    let len = self.slots.len();
    self
      .get_mut(handle)
      .ok_or_else(|| SimError::range(caller, handle.index(), len))
  }

  /// Iterate over live values with their handles.
  pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
    self
      .slots
      .iter()
      .enumerate()
      .filter_map(|(index, slot)| match slot {
        Slot::Occupied { generation, value } => {
          Some((Handle::new(index as u32, *generation), value))
        }
        Slot::Vacant { .. } => None,
      })
  }

  /// Handles of all live values.
  pub fn handles(&self) -> Vec<Handle<T>> {
    self.iter().map(|(handle, _)| handle).collect()
  }
}

impl<T> Default for Arena<T> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
#[path = "arena_test.rs"]
mod arena_test;
