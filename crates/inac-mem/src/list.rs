//! Doubly linked list whose nodes live in an owned arena.
//!
//! Nodes are carved from a `DYNAMIC` [`Arena`] with
//! [`Arena::alloc_forward`] and never returned to it individually. A removed
//! node goes onto a LIFO free-list (up to `max_recyclable` entries) and is
//! reused by the next insertion; beyond that limit its slot is abandoned
//! until the list is dropped or resized.
//!
//! # Examples
//!
//! ```
//! use inac_mem::NodeList;
//!
//! let mut list = NodeList::new().unwrap();
//! list.push_back(3).unwrap();
//! list.push_back(1).unwrap();
//! list.push_front(2).unwrap();
//!
//! list.sort_by(|a, b| a.cmp(b));
//! assert_eq!(list.iter().copied().collect::<Vec<_>>(), [1, 2, 3]);
//!
//! assert_eq!(list.pop_front(), Some(1));
//! assert_eq!(list.recyclable(), 1);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::ptr::NonNull;

use crate::arena::{ALIGN, Arena};
use crate::error::{Error, Result};
use crate::flags::PoolFlags;

/// Nodes reserved in a fresh list's arena.
pub const DEFAULT_NODES: usize = 256;

/// Free-list limit of a fresh list.
pub const DEFAULT_MAX_RECYCLABLE: usize = 256;

type Link<T> = Option<NonNull<Node<T>>>;

struct Node<T> {
    prev: Link<T>,
    next: Link<T>,
    value: MaybeUninit<T>,
}

/// An arena-backed doubly linked list with node recycling.
pub struct NodeList<T> {
    arena: Option<Arena>,
    head: Link<T>,
    tail: Link<T>,
    len: usize,
    free: Vec<NonNull<Node<T>>>,
    min_nodes: usize,
    max_recyclable: usize,
    _marker: PhantomData<T>,
}

// SAFETY: the list owns its nodes and their arena outright.
unsafe impl<T: Send> Send for NodeList<T> {}

impl<T> NodeList<T> {
    const NODE_SIZE: usize = mem::size_of::<Node<T>>();

    /// Creates a list with room for [`DEFAULT_NODES`] nodes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAlignment`] if `T` needs more than [`ALIGN`].
    /// - Whatever [`Arena::new`] reports.
    pub fn new() -> Result<Self> {
        Self::with_capacity(DEFAULT_NODES, DEFAULT_MAX_RECYCLABLE)
    }

    /// Creates a list whose arena holds `min_nodes` nodes per chunk and whose
    /// free-list keeps up to `max_recyclable` nodes.
    ///
    /// # Errors
    ///
    /// As [`NodeList::new`].
    pub fn with_capacity(min_nodes: usize, max_recyclable: usize) -> Result<Self> {
        let mut list = Self::unallocated();
        list.min_nodes = min_nodes.max(1);
        list.max_recyclable = max_recyclable;
        list.ensure_arena()?;
        Ok(list)
    }

    /// Creates a list without allocating; the arena is created on the first
    /// insertion.
    #[must_use]
    pub const fn unallocated() -> Self {
        NodeList {
            arena: None,
            head: None,
            tail: None,
            len: 0,
            free: Vec::new(),
            min_nodes: DEFAULT_NODES,
            max_recyclable: DEFAULT_MAX_RECYCLABLE,
            _marker: PhantomData,
        }
    }

    /// Moves every value into a fresh arena sized for `min_nodes` nodes and
    /// sets a new free-list limit. Order is preserved.
    ///
    /// # Errors
    ///
    /// As [`NodeList::new`]. On failure the list is unchanged.
    pub fn resize(&mut self, min_nodes: usize, max_recyclable: usize) -> Result<()> {
        let mut fresh = Self::with_capacity(min_nodes.max(self.len), max_recyclable)?;
        fresh.min_nodes = min_nodes.max(1);
        while let Some(value) = self.pop_front() {
            fresh.push_back(value)?;
        }
        *self = fresh;
        Ok(())
    }

    fn ensure_arena(&mut self) -> Result<&Arena> {
        if mem::align_of::<Node<T>>() > ALIGN {
            return Err(Error::InvalidAlignment {
                alignment: mem::align_of::<Node<T>>(),
            });
        }
        if self.arena.is_none() {
            let capacity = Self::NODE_SIZE
                .checked_mul(self.min_nodes)
                .ok_or(Error::OutOfMemory)?;
            self.arena = Some(Arena::new(capacity, PoolFlags::DYNAMIC)?);
        }
        self.arena.as_ref().ok_or(Error::OutOfMemory)
    }

    fn alloc_node(&mut self, value: T) -> Result<NonNull<Node<T>>> {
        let node = match self.free.pop() {
            Some(node) => node,
            None => self
                .ensure_arena()?
                .alloc_forward(Self::NODE_SIZE)?
                .cast::<Node<T>>(),
        };
        // SAFETY: the slot is at least NODE_SIZE bytes and ALIGN-aligned,
        // which covers Node<T> (checked in `ensure_arena`).
        unsafe {
            node.as_ptr().write(Node {
                prev: None,
                next: None,
                value: MaybeUninit::new(value),
            });
        }
        Ok(node)
    }

    /// Takes the value out of an unlinked node and recycles the slot.
    fn release_node(&mut self, node: NonNull<Node<T>>) -> T {
        // SAFETY: live nodes always hold an initialised value, read once.
        let value = unsafe { (*node.as_ptr()).value.assume_init_read() };
        if self.free.len() < self.max_recyclable {
            self.free.push(node);
        }
        value
    }

    fn link_back(&mut self, node: NonNull<Node<T>>) {
        // SAFETY: `node` is freshly allocated and every linked node is live.
        unsafe {
            (*node.as_ptr()).prev = self.tail;
            match self.tail {
                Some(tail) => (*tail.as_ptr()).next = Some(node),
                None => self.head = Some(node),
            }
        }
        self.tail = Some(node);
        self.len += 1;
    }

    fn link_front(&mut self, node: NonNull<Node<T>>) {
        // SAFETY: as `link_back`.
        unsafe {
            (*node.as_ptr()).next = self.head;
            match self.head {
                Some(head) => (*head.as_ptr()).prev = Some(node),
                None => self.tail = Some(node),
            }
        }
        self.head = Some(node);
        self.len += 1;
    }

    fn unlink(&mut self, node: NonNull<Node<T>>) {
        // SAFETY: `node` is linked into this list.
        unsafe {
            let prev = (*node.as_ptr()).prev;
            let next = (*node.as_ptr()).next;
            match prev {
                Some(prev) => (*prev.as_ptr()).next = next,
                None => self.head = next,
            }
            match next {
                Some(next) => (*next.as_ptr()).prev = prev,
                None => self.tail = prev,
            }
        }
        self.len -= 1;
    }

    /// Appends `value`.
    ///
    /// # Errors
    ///
    /// Allocation errors from the arena.
    pub fn push_back(&mut self, value: T) -> Result<()> {
        let node = self.alloc_node(value)?;
        self.link_back(node);
        Ok(())
    }

    /// Prepends `value`.
    ///
    /// # Errors
    ///
    /// Allocation errors from the arena.
    pub fn push_front(&mut self, value: T) -> Result<()> {
        let node = self.alloc_node(value)?;
        self.link_front(node);
        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let node = self.head?;
        self.unlink(node);
        Some(self.release_node(node))
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let node = self.tail?;
        self.unlink(node);
        Some(self.release_node(node))
    }

    #[must_use]
    pub fn front(&self) -> Option<&T> {
        // SAFETY: linked nodes are live and initialised.
        self.head
            .map(|node| unsafe { (*node.as_ptr()).value.assume_init_ref() })
    }

    #[must_use]
    pub fn back(&self) -> Option<&T> {
        // SAFETY: as `front`.
        self.tail
            .map(|node| unsafe { (*node.as_ptr()).value.assume_init_ref() })
    }

    pub fn front_mut(&mut self) -> Option<&mut T> {
        // SAFETY: as `front`; `&mut self` makes the access unique.
        self.head
            .map(|node| unsafe { (*node.as_ptr()).value.assume_init_mut() })
    }

    fn find_node(&self, mut pred: impl FnMut(&T) -> bool) -> Link<T> {
        let mut cursor = self.head;
        while let Some(node) = cursor {
            // SAFETY: linked nodes are live and initialised.
            let node_ref = unsafe { &*node.as_ptr() };
            if pred(unsafe { node_ref.value.assume_init_ref() }) {
                return Some(node);
            }
            cursor = node_ref.next;
        }
        None
    }

    /// Returns the first value satisfying `pred`.
    pub fn find(&self, pred: impl FnMut(&T) -> bool) -> Option<&T> {
        // SAFETY: linked nodes are live and initialised.
        self.find_node(pred)
            .map(|node| unsafe { (*node.as_ptr()).value.assume_init_ref() })
    }

    /// Removes and returns the first value satisfying `pred`.
    pub fn remove_first(&mut self, pred: impl FnMut(&T) -> bool) -> Option<T> {
        let node = self.find_node(pred)?;
        self.unlink(node);
        Some(self.release_node(node))
    }

    /// Calls `f` on every value in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// The first error returned by `f`.
    pub fn for_each<E>(
        &self,
        mut f: impl FnMut(&T) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        for value in self.iter() {
            f(value)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            cursor: self.head,
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    /// Sorts the list with a stable merge sort. Nodes are relinked, never
    /// moved or reallocated.
    pub fn sort_by(&mut self, mut cmp: impl FnMut(&T, &T) -> Ordering) {
        if self.len < 2 {
            return;
        }
        let head = merge_sort(self.head, self.len, &mut cmp);

        // Rebuild the back links and the tail.
        let mut prev = None;
        let mut cursor = head;
        while let Some(node) = cursor {
            // SAFETY: every node came from this list.
            unsafe {
                (*node.as_ptr()).prev = prev;
                cursor = (*node.as_ptr()).next;
            }
            prev = Some(node);
        }
        self.head = head;
        self.tail = prev;
    }

    /// Moves every value of `other` to the end of this list.
    ///
    /// `other`'s arena is merged into this list's arena so its nodes stay in
    /// place; its recycled nodes join this list's free-list while there is
    /// room.
    ///
    /// # Errors
    ///
    /// Whatever [`Arena::merge`] reports.
    pub fn concat(&mut self, mut other: NodeList<T>) -> Result<()> {
        let head = other.head.take();
        let tail = other.tail.take();
        let len = mem::take(&mut other.len);
        let free = mem::take(&mut other.free);

        if let Some(theirs) = other.arena.take() {
            if let Some(arena) = &mut self.arena {
                arena.merge(theirs)?;
            } else {
                self.arena = Some(theirs);
            }
        }

        if let Some(head) = head {
            // SAFETY: the nodes now live in this list's arena.
            unsafe {
                (*head.as_ptr()).prev = self.tail;
                match self.tail {
                    Some(tail) => (*tail.as_ptr()).next = Some(head),
                    None => self.head = Some(head),
                }
            }
            self.tail = tail;
            self.len += len;
        }

        let room = self.max_recyclable.saturating_sub(self.free.len());
        self.free.extend(free.into_iter().take(room));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes held by the list: the arena's chunks plus the free-list table.
    #[must_use]
    pub fn usage(&self) -> usize {
        let arena = self.arena.as_ref().map_or(0, |a| a.info().total_size);
        arena + mem::size_of::<NonNull<Node<T>>>() * self.max_recyclable
    }

    /// Nodes waiting on the free-list.
    #[must_use]
    pub fn recyclable(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub fn max_recyclable(&self) -> usize {
        self.max_recyclable
    }
}

/// Sorts the `len` nodes starting at `head` by their `next` links and returns
/// the new head. Back links are left stale.
fn merge_sort<T>(
    head: Link<T>,
    len: usize,
    cmp: &mut impl FnMut(&T, &T) -> Ordering,
) -> Link<T> {
    if len < 2 {
        if let Some(node) = head {
            // SAFETY: `node` belongs to the list being sorted.
            unsafe { (*node.as_ptr()).next = None };
        }
        return head;
    }

    let left_len = len / 2;
    let mut split = head;
    for _ in 0..left_len {
        // SAFETY: the run is `len` nodes long.
        split = split.and_then(|node| unsafe { (*node.as_ptr()).next });
    }

    let left = merge_sort(head, left_len, cmp);
    let right = merge_sort(split, len - left_len, cmp);
    merge(left, right, cmp)
}

/// Merges two sorted, `None`-terminated runs. Ties take from `left`.
fn merge<T>(
    mut left: Link<T>,
    mut right: Link<T>,
    cmp: &mut impl FnMut(&T, &T) -> Ordering,
) -> Link<T> {
    let mut head: Link<T> = None;
    let mut tail: Link<T> = None;

    loop {
        let next = match (left, right) {
            (Some(l), Some(r)) => {
                // SAFETY: both nodes are live and initialised.
                let take_right = unsafe {
                    cmp(
                        (*r.as_ptr()).value.assume_init_ref(),
                        (*l.as_ptr()).value.assume_init_ref(),
                    ) == Ordering::Less
                };
                if take_right {
                    right = unsafe { (*r.as_ptr()).next };
                    r
                } else {
                    left = unsafe { (*l.as_ptr()).next };
                    l
                }
            }
            (Some(rest), None) | (None, Some(rest)) => {
                match tail {
                    // SAFETY: `tail` is a node of the merged run.
                    Some(tail) => unsafe { (*tail.as_ptr()).next = Some(rest) },
                    None => head = Some(rest),
                }
                return head;
            }
            (None, None) => return head,
        };

        match tail {
            // SAFETY: `tail` is a node of the merged run.
            Some(tail) => unsafe { (*tail.as_ptr()).next = Some(next) },
            None => head = Some(next),
        }
        tail = Some(next);
    }
}

impl<T> Default for NodeList<T> {
    fn default() -> Self {
        Self::unallocated()
    }
}

impl<T> Drop for NodeList<T> {
    fn drop(&mut self) {
        let mut cursor = self.head.take();
        while let Some(node) = cursor {
            // SAFETY: linked nodes are live; each value is dropped once.
            unsafe {
                cursor = (*node.as_ptr()).next;
                (*node.as_ptr()).value.assume_init_drop();
            }
        }
        // The arena field drops afterwards and releases every slot.
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Front-to-back iterator over a [`NodeList`].
pub struct Iter<'l, T> {
    cursor: Link<T>,
    remaining: usize,
    _marker: PhantomData<&'l T>,
}

impl<'l, T> Iterator for Iter<'l, T> {
    type Item = &'l T;

    fn next(&mut self) -> Option<&'l T> {
        let node = self.cursor?;
        // SAFETY: the list is borrowed for 'l, so the node stays live.
        unsafe {
            let node = &*node.as_ptr();
            self.cursor = node.next;
            self.remaining -= 1;
            Some(node.value.assume_init_ref())
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'l, T> IntoIterator for &'l NodeList<T> {
    type Item = &'l T;
    type IntoIter = Iter<'l, T>;

    fn into_iter(self) -> Iter<'l, T> {
        self.iter()
    }
}
