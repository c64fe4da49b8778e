//! NeighborListSet - single-pass merge over several neighbor lists.
//!
//! Lists are pushed like a stack and drained from the top, so traversal
//! visits the most recently added list first:
//!
//! ```text
//! add_list(same); add_list(coarser); add_list(finer)
//!
//!   stack: [ same | coarser | finer ]  ◀── cursor starts here
//!   order: finer..., coarser..., same...
//! ```
//!
//! The set borrows the lists, so the owning cell cannot be mutated while a
//! traversal is alive. Collect the ids first when the loop body must write.

use smallvec::SmallVec;

use super::cell::LinkId;
use super::dimension::Dimension;
use crate::constants::MAX_NEIGHBOR_LISTS;
use crate::error::{SimError, SimResult};

/// Non-owning iterator over up to [`MAX_NEIGHBOR_LISTS`] link lists.
pub struct NeighborListSet<'a, D: Dimension> {
  lists: SmallVec<[&'a [LinkId<D>]; MAX_NEIGHBOR_LISTS]>,
  cursor: usize,
  started: bool,
}

impl<'a, D: Dimension> Default for NeighborListSet<'a, D> {
  fn default() -> Self {
    Self::new()
  }
}

impl<'a, D: Dimension> NeighborListSet<'a, D> {
  /// Empty set.
  pub fn new() -> Self {
    Self {
      lists: SmallVec::new(),
      cursor: 0,
      started: false,
    }
  }

  /// Set over a fixed group of a cell's own lists.
  pub(crate) fn over<const N: usize>(lists: [&'a [LinkId<D>]; N]) -> Self {
    const { assert!(N <= MAX_NEIGHBOR_LISTS) };
    Self {
      lists: lists.into_iter().collect(),
      cursor: 0,
      started: false,
    }
  }

  /// Number of lists not yet drained.
  #[inline]
  pub fn list_count(&self) -> usize {
    self.lists.len()
  }

  /// Push another list onto the stack.
  pub fn add_list(&mut self, list: &'a [LinkId<D>]) -> SimResult<()> {
    if self.started {
      return Err(SimError::contract(
        "NeighborListSet::add_list",
        "iteration already started",
      ));
    }
    if self.lists.len() >= MAX_NEIGHBOR_LISTS {
      return Err(SimError::range(
        "NeighborListSet::add_list",
        self.lists.len(),
        MAX_NEIGHBOR_LISTS,
      ));
    }
    // Empty slices may share a dangling pointer; only populated ones can alias.
    let duplicate = !list.is_empty()
      && self
        .lists
        .iter()
        .any(|l| l.as_ptr() == list.as_ptr() && l.len() == list.len());
    if duplicate {
      return Err(SimError::contract(
        "NeighborListSet::add_list",
        "list added twice",
      ));
    }
    self.lists.push(list);
    Ok(())
  }

  /// Start the traversal and return its first link.
  pub fn first(&mut self) -> SimResult<Option<LinkId<D>>> {
    if self.started {
      return Err(SimError::contract(
        "NeighborListSet::first",
        "traversal is not restartable",
      ));
    }
    Ok(self.advance())
  }

  fn advance(&mut self) -> Option<LinkId<D>> {
    self.started = true;
    loop {
      let top = *self.lists.last()?;
      if let Some(&link) = top.get(self.cursor) {
        self.cursor += 1;
        return Some(link);
      }
      self.lists.pop();
      self.cursor = 0;
    }
  }
}

impl<'a, D: Dimension> Iterator for NeighborListSet<'a, D> {
  type Item = LinkId<D>;

  #[inline]
  fn next(&mut self) -> Option<Self::Item> {
    self.advance()
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let remaining = match self.lists.split_last() {
      Some((top, rest)) => {
        top.len().saturating_sub(self.cursor) + rest.iter().map(|l| l.len()).sum::<usize>()
      }
      None => 0,
    };
    (remaining, Some(remaining))
  }
}
