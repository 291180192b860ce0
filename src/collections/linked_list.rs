//! Doubly-linked list stored in an index arena.
//!
//! Nodes live in a `Vec` of slots and link to each other by slot index, so
//! the back-link is plain data rather than a second owner. Removed slots are
//! recycled; every slot carries a generation counter so a [`NodeRef`] to a
//! removed node can never address whatever moved into its slot later.
//!
//! Complexity:
//! - `append`, `prepend`, `shift`, `pop` and `delete` by [`NodeRef`]: `O(1)`
//! - `get`, `insert_at`, `delete_at`: `O(n)`

use std::fmt;
use std::iter::FusedIterator;

/// Handle to a node inside a [`LinkedList`].
///
/// Returned by the insertion methods and by [`LinkedList::node_at`]. Only
/// valid for the list that produced it, and only until that node is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
  index: usize,
  generation: u64,
}

#[derive(Debug, Clone)]
struct Node<T> {
  value: T,
  next: Option<usize>,
  /// Back-link used for unlinking only.
  prev: Option<usize>,
}

#[derive(Debug, Clone)]
struct Slot<T> {
  generation: u64,
  node: Option<Node<T>>,
}

/// Generic doubly-linked list.
#[derive(Clone)]
pub struct LinkedList<T> {
  slots: Vec<Slot<T>>,
  free: Vec<usize>,
  head: Option<usize>,
  tail: Option<usize>,
  len: usize,
}

impl<T> Default for LinkedList<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> LinkedList<T> {
  pub fn new() -> Self {
    Self {
      slots: Vec::new(),
      free: Vec::new(),
      head: None,
      tail: None,
      len: 0,
    }
  }

  /// Number of entries in the list.
  pub fn len(&self) -> usize {
    self.len
  }

  /// Alias of [`len`](Self::len).
  pub fn size(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Add a value to the end of the list.
  pub fn append(&mut self, value: T) -> NodeRef {
    let index = self.alloc(Node {
      value,
      next: None,
      prev: self.tail,
    });

    match self.tail.and_then(|t| self.node_mut(t)) {
      Some(old_tail) => old_tail.next = Some(index),
      None => self.head = Some(index),
    }
    self.tail = Some(index);
    self.len += 1;

    self.handle(index)
  }

  /// Add a value to the start of the list.
  pub fn prepend(&mut self, value: T) -> NodeRef {
    let index = self.alloc(Node {
      value,
      next: self.head,
      prev: None,
    });

    match self.head.and_then(|h| self.node_mut(h)) {
      Some(old_head) => old_head.prev = Some(index),
      None => self.tail = Some(index),
    }
    self.head = Some(index);
    self.len += 1;

    self.handle(index)
  }

  /// First value, if any.
  pub fn head(&self) -> Option<&T> {
    self.head.and_then(|i| self.node(i)).map(|n| &n.value)
  }

  /// Last value, if any.
  pub fn tail(&self) -> Option<&T> {
    self.tail.and_then(|i| self.node(i)).map(|n| &n.value)
  }

  pub fn head_ref(&self) -> Option<NodeRef> {
    self.head.map(|i| self.handle(i))
  }

  pub fn tail_ref(&self) -> Option<NodeRef> {
    self.tail.map(|i| self.handle(i))
  }

  /// Remove and return the first value.
  pub fn shift(&mut self) -> Option<T> {
    let head = self.head?;
    self.unlink(head)
  }

  /// Remove and return the last value.
  pub fn pop(&mut self) -> Option<T> {
    let tail = self.tail?;
    self.unlink(tail)
  }

  /// Value at `index`, walking from the head.
  pub fn get(&self, index: usize) -> Option<&T> {
    self.index_at(index).and_then(|i| self.node(i)).map(|n| &n.value)
  }

  pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
    let slot = self.index_at(index)?;
    self.node_mut(slot).map(|n| &mut n.value)
  }

  /// Handle to the node at `index`, for a later `O(1)` [`delete`](Self::delete).
  pub fn node_at(&self, index: usize) -> Option<NodeRef> {
    self.index_at(index).map(|i| self.handle(i))
  }

  /// Value behind a handle, or `None` if the node has been removed.
  pub fn value(&self, node: NodeRef) -> Option<&T> {
    self.resolve(node).and_then(|i| self.node(i)).map(|n| &n.value)
  }

  /// Insert a value at `index`, shifting the node there (and everything
  /// after it) one position back.
  ///
  /// `0` prepends. An index at or past the end appends.
  ///
  /// ```
  /// use shiftclock::collections::LinkedList;
  ///
  /// let mut list = LinkedList::new();
  /// list.append("1");
  /// list.append("2");
  /// list.insert_at(1, "1.5");
  /// assert_eq!(list.iter().copied().collect::<Vec<_>>(), ["1", "1.5", "2"]);
  /// ```
  pub fn insert_at(&mut self, index: usize, value: T) -> NodeRef {
    if index == 0 {
      return self.prepend(value);
    }

    let Some(next) = self.index_at(index) else {
      return self.append(value);
    };
    let prev = self.node(next).and_then(|n| n.prev);

    let new = self.alloc(Node {
      value,
      next: Some(next),
      prev,
    });

    if let Some(node) = self.node_mut(next) {
      node.prev = Some(new);
    }
    match prev.and_then(|p| self.node_mut(p)) {
      Some(node) => node.next = Some(new),
      None => self.head = Some(new),
    }
    self.len += 1;

    self.handle(new)
  }

  /// Remove the node at `index` and return its value.
  pub fn delete_at(&mut self, index: usize) -> Option<T> {
    let slot = self.index_at(index)?;
    self.unlink(slot)
  }

  /// Remove the node behind a handle and return its value.
  ///
  /// Returns `None` for a handle whose node was already removed.
  pub fn delete(&mut self, node: NodeRef) -> Option<T> {
    let slot = self.resolve(node)?;
    self.unlink(slot)
  }

  /// Remove every node. Handles issued before the clear stay dead.
  pub fn clear(&mut self) {
    self.free.clear();
    for (index, slot) in self.slots.iter_mut().enumerate() {
      if slot.node.take().is_some() {
        slot.generation += 1;
      }
      self.free.push(index);
    }
    self.head = None;
    self.tail = None;
    self.len = 0;
  }

  /// Iterate values from head to tail. Each call starts a fresh pass.
  pub fn iter(&self) -> Iter<'_, T> {
    Iter {
      list: self,
      cursor: self.head,
      remaining: self.len,
    }
  }

  fn handle(&self, index: usize) -> NodeRef {
    NodeRef {
      index,
      generation: self.slots[index].generation,
    }
  }

  fn resolve(&self, node: NodeRef) -> Option<usize> {
    let slot = self.slots.get(node.index)?;
    (slot.generation == node.generation && slot.node.is_some()).then_some(node.index)
  }

  fn node(&self, index: usize) -> Option<&Node<T>> {
    self.slots.get(index).and_then(|s| s.node.as_ref())
  }

  fn node_mut(&mut self, index: usize) -> Option<&mut Node<T>> {
    self.slots.get_mut(index).and_then(|s| s.node.as_mut())
  }

  fn index_at(&self, index: usize) -> Option<usize> {
    if index >= self.len {
      return None;
    }

    let mut current = self.head;
    for _ in 0..index {
      current = self.node(current?)?.next;
    }
    current
  }

  fn alloc(&mut self, node: Node<T>) -> usize {
    match self.free.pop() {
      Some(index) => {
        self.slots[index].node = Some(node);
        index
      }
      None => {
        self.slots.push(Slot {
          generation: 0,
          node: Some(node),
        });
        self.slots.len() - 1
      }
    }
  }

  /// Detach a live slot from its neighbours and recycle it.
  fn unlink(&mut self, index: usize) -> Option<T> {
    let slot = self.slots.get_mut(index)?;
    let node = slot.node.take()?;
    slot.generation += 1;
    self.free.push(index);

    match node.prev.and_then(|p| self.node_mut(p)) {
      Some(prev) => prev.next = node.next,
      None => self.head = node.next,
    }
    match node.next.and_then(|n| self.node_mut(n)) {
      Some(next) => next.prev = node.prev,
      None => self.tail = node.prev,
    }
    self.len -= 1;

    Some(node.value)
  }
}

/// Borrowing iterator over a [`LinkedList`].
pub struct Iter<'a, T> {
  list: &'a LinkedList<T>,
  cursor: Option<usize>,
  remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
  type Item = &'a T;

  fn next(&mut self) -> Option<Self::Item> {
    let node = self.list.node(self.cursor?)?;
    self.cursor = node.next;
    self.remaining = self.remaining.saturating_sub(1);
    Some(&node.value)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

/// Owning iterator, draining from the head.
pub struct IntoIter<T> {
  list: LinkedList<T>,
}

impl<T> Iterator for IntoIter<T> {
  type Item = T;

  fn next(&mut self) -> Option<T> {
    self.list.shift()
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.list.len, Some(self.list.len))
  }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<T> IntoIterator for LinkedList<T> {
  type Item = T;
  type IntoIter = IntoIter<T>;

  fn into_iter(self) -> IntoIter<T> {
    IntoIter { list: self }
  }
}

impl<'a, T> IntoIterator for &'a LinkedList<T> {
  type Item = &'a T;
  type IntoIter = Iter<'a, T>;

  fn into_iter(self) -> Iter<'a, T> {
    self.iter()
  }
}

impl<T> FromIterator<T> for LinkedList<T> {
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    let mut list = LinkedList::new();
    list.extend(iter);
    list
  }
}

impl<T> Extend<T> for LinkedList<T> {
  fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
    for value in iter {
      self.append(value);
    }
  }
}

impl<T: fmt::Debug> fmt::Debug for LinkedList<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.iter()).finish()
  }
}
