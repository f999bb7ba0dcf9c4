/*
 * Created on Fri Feb 16 2024
 *
 * This file is a part of Skytrie
 * Skytrie is a free and open-source concurrent radix trie library written by
 * Sayan Nandan ("the Author") with the vision to provide fast shared prefix
 * indexing without compromising on correctness or memory efficiency.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use {
    super::Node,
    crate::mem::unsafe_apis,
    std::{mem, ptr, ptr::NonNull, slice},
};

/// Preventive allocation growth factor. A good choice is between 1.5 and 2
const GROWTH_FACTOR: f64 = 1.618;
/// Ceiling for preventive allocation. Past this the table grows one slot at a
/// time. Tuned for byte-sized selectors; a small compile-time alphabet would
/// want this lowered to the alphabet size
const GROWTH_CAP: usize = 8 * mem::size_of::<u8>();
/// The very first growth of an empty table
const FIRST_ALLOC: usize = 2;

/// An ordered table of child edges: a `firsts` array of selector bytes
/// (strictly increasing) parallel to an array of owned child node pointers.
///
/// The table starts in a null-slab state (no backing allocation at all),
/// which is distinct from an allocated table that happens to be empty. The
/// two states are observably different for the tree root: a fresh (or fully
/// reset) trie has a null slab, while a root that went through structural
/// edits keeps its slab around. Capacity never shrinks.
///
/// Dropping a table releases the slab only; the child nodes themselves are
/// owned by the tree teardown paths which detach them first.
pub(super) struct ChildTable {
    firsts: *mut u8,
    childs: *mut NonNull<Node>,
    len: usize,
    cap: usize,
}

impl ChildTable {
    pub const fn null() -> Self {
        Self {
            firsts: ptr::null_mut(),
            childs: ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }
    /// An allocated table with no entries (the materialized-but-empty state)
    pub fn alloc_empty() -> Self {
        let mut t = Self::null();
        t.grow_to(FIRST_ALLOC);
        t
    }
    #[inline(always)]
    pub const fn is_null(&self) -> bool {
        self.firsts.is_null()
    }
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.len
    }
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
    #[cfg(test)]
    pub const fn capacity(&self) -> usize {
        self.cap
    }
    #[inline(always)]
    pub fn firsts(&self) -> &[u8] {
        if self.is_null() {
            return &[];
        }
        unsafe {
            // UNSAFE(@ohsayan): non-null slab; len entries are initialized
            slice::from_raw_parts(self.firsts, self.len)
        }
    }
    #[inline(always)]
    pub fn children(&self) -> &[NonNull<Node>] {
        if self.is_null() {
            return &[];
        }
        unsafe {
            // UNSAFE(@ohsayan): non-null slab; len entries are initialized
            slice::from_raw_parts(self.childs, self.len)
        }
    }
    #[inline(always)]
    pub fn first_at(&self, pos: usize) -> u8 {
        self.firsts()[pos]
    }
    #[inline(always)]
    pub fn child_at(&self, pos: usize) -> NonNull<Node> {
        self.children()[pos]
    }
    /// Binary search for a selector byte. Returns `(true, pos)` on an exact
    /// hit, otherwise `(false, pos)` with `pos` being the order-preserving
    /// insertion index
    pub fn search(&self, b: u8) -> (bool, usize) {
        let firsts = self.firsts();
        let (mut begin, mut end) = (0usize, firsts.len());
        while begin < end {
            let mid = begin + (end - begin) / 2;
            if firsts[mid] > b {
                end = mid;
            } else if firsts[mid] < b {
                begin = mid + 1;
            } else {
                return (true, mid);
            }
        }
        (false, begin)
    }
    /// Insert an entry at `pos`, shifting the tail one slot right. `pos` must
    /// be the index returned by [`Self::search`] for the ordering invariant to
    /// hold
    pub fn insert(&mut self, pos: usize, first: u8, child: NonNull<Node>) {
        debug_assert!(pos <= self.len);
        if self.len == self.cap {
            self.grow_to(self.next_cap());
        }
        unsafe {
            // UNSAFE(@ohsayan): capacity verified above; tail stays within the slab
            ptr::copy(
                self.firsts.add(pos),
                self.firsts.add(pos + 1),
                self.len - pos,
            );
            ptr::copy(
                self.childs.add(pos),
                self.childs.add(pos + 1),
                self.len - pos,
            );
            self.firsts.add(pos).write(first);
            self.childs.add(pos).write(child);
        }
        self.len += 1;
        debug_assert!(self.ordered());
    }
    /// Remove the entry at `pos`, shifting the tail one slot left and handing
    /// the detached child pointer back to the caller. Capacity is untouched
    pub fn remove(&mut self, pos: usize) -> NonNull<Node> {
        debug_assert!(pos < self.len);
        unsafe {
            // UNSAFE(@ohsayan): pos is in range; the shift stays within len
            let child = self.childs.add(pos).read();
            self.len -= 1;
            ptr::copy(
                self.firsts.add(pos + 1),
                self.firsts.add(pos),
                self.len - pos,
            );
            ptr::copy(
                self.childs.add(pos + 1),
                self.childs.add(pos),
                self.len - pos,
            );
            child
        }
    }
    /// Swap the child pointer at `pos` (the selector byte is untouched),
    /// returning the previous occupant
    pub fn replace(&mut self, pos: usize, child: NonNull<Node>) -> NonNull<Node> {
        debug_assert!(pos < self.len);
        unsafe {
            // UNSAFE(@ohsayan): pos is in range
            let old = self.childs.add(pos).read();
            self.childs.add(pos).write(child);
            old
        }
    }
    fn next_cap(&self) -> usize {
        if self.cap == 0 {
            FIRST_ALLOC
        } else if self.cap >= GROWTH_CAP {
            // reached the preventive ceiling: one more slot
            self.cap + 1
        } else {
            let ncap = ((self.cap as f64) * GROWTH_FACTOR).ceil() as usize;
            ncap.min(GROWTH_CAP)
        }
    }
    fn grow_to(&mut self, ncap: usize) {
        debug_assert!(ncap > self.cap);
        unsafe {
            // UNSAFE(@ohsayan): this is a realloc (or a malloc when cap is 0)
            self.firsts = unsafe_apis::realloc_array(self.firsts, self.cap, ncap);
            self.childs = unsafe_apis::realloc_array(self.childs, self.cap, ncap);
        }
        self.cap = ncap;
    }
    fn ordered(&self) -> bool {
        self.firsts().windows(2).all(|w| w[0] < w[1])
    }
}

impl Drop for ChildTable {
    fn drop(&mut self) {
        if !self.is_null() {
            unsafe {
                // UNSAFE(@ohsayan): non-null slab sized cap; entries are plain
                // pointers and bytes, so no dtors to run here
                unsafe_apis::dealloc_array(self.firsts, self.cap);
                unsafe_apis::dealloc_array(self.childs, self.cap);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::ChildTable, std::ptr::NonNull};

    fn dangling() -> NonNull<super::Node> {
        NonNull::dangling()
    }

    #[test]
    fn null_slab_vs_allocated_empty() {
        let null = ChildTable::null();
        assert!(null.is_null() && null.is_empty());
        let empty = ChildTable::alloc_empty();
        assert!(!empty.is_null() && empty.is_empty());
        assert_eq!(empty.capacity(), 2);
    }

    #[test]
    fn search_semantics() {
        let mut t = ChildTable::null();
        for (i, b) in [b'b', b'd', b'f'].into_iter().enumerate() {
            t.insert(i, b, dangling());
        }
        assert_eq!(t.search(b'd'), (true, 1));
        assert_eq!(t.search(b'a'), (false, 0));
        assert_eq!(t.search(b'c'), (false, 1));
        assert_eq!(t.search(b'z'), (false, 3));
    }

    #[test]
    fn gap_insert_keeps_order() {
        let mut t = ChildTable::null();
        for b in [b'q', b'a', b'm', b'z', b'c'] {
            let (found, pos) = t.search(b);
            assert!(!found);
            t.insert(pos, b, dangling());
        }
        assert_eq!(t.firsts(), b"acmqz");
    }

    #[test]
    fn remove_shifts_left() {
        let mut t = ChildTable::null();
        for (i, b) in [b'a', b'b', b'c'].into_iter().enumerate() {
            t.insert(i, b, dangling());
        }
        let cap = t.capacity();
        t.remove(1);
        assert_eq!(t.firsts(), b"ac");
        // capacity never shrinks
        assert_eq!(t.capacity(), cap);
    }

    #[test]
    fn growth_schedule() {
        let mut t = ChildTable::null();
        let mut caps = vec![];
        for i in 0..12u8 {
            if t.len() == t.capacity() {
                caps.push(t.capacity());
            }
            t.insert(i as usize, i, dangling());
        }
        // 0 -> 2 -> 4 -> 7 -> 8, then one at a time
        assert_eq!(caps, [0, 2, 4, 7, 8, 9, 10, 11]);
    }
}
