/*
 * Created on Sun Feb 18 2024
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

/*
    iterators
    ---
    Both iterators hold no locks between calls. Every call re-locks from the
    root and navigates back to the resume point by comparing the previously
    yielded key byte-for-byte against the tree, taking the strictly-greater
    branch on every tie. Under a quiescent tree this yields every key exactly
    once in lexicographic order; under concurrent mutation a key may be seen
    twice or skipped, but forward progress in key order (and hence
    termination) always holds.

    Within one call the descent read-locks the path it is standing on (the
    same discipline as the serializer walk) so that a failed probe can fall
    back to the next sibling of an ancestor.
*/

use {
    super::{data::first_mismatch, Node, Trie},
    std::ptr::NonNull,
};

/// Append the smallest completion of `node` (whose label participates from
/// `from` onwards) to `buf`. Returns false only when the node has neither a
/// key nor children (the vacant root).
///
/// ## Safety
/// `node` must be read-locked by the caller; it stays locked on return
unsafe fn descend_min(node: NonNull<Node>, from: usize, buf: &mut Vec<u8>) -> bool {
    let n = node.as_ref();
    let d = n.data();
    buf.extend_from_slice(&d.label().as_slice()[from..]);
    if d.is_end() {
        // the shortest completion through this node ends right here
        return true;
    }
    let ct = n.childs();
    if ct.is_empty() {
        return false;
    }
    buf.push(ct.first_at(0));
    let child = ct.child_at(0);
    child.as_ref().lock.read();
    let r = descend_min(child, 0, buf);
    child.as_ref().lock.unlock_read();
    r
}

/// Replace `key[off..]` with the smallest completion through `node` that is
/// strictly greater than the current `key[off..]`. Returns false when the
/// subtree has no such completion (the caller then probes the next sibling
/// of an ancestor).
///
/// ## Safety
/// `node` must be read-locked by the caller; it stays locked on return
unsafe fn descend_next(node: NonNull<Node>, from: usize, off: usize, key: &mut Vec<u8>) -> bool {
    let n = node.as_ref();
    let d = n.data();
    let label = &d.label().as_slice()[from..];
    let rem = &key[off..];
    let m = first_mismatch(rem, label);
    if m < label.len() {
        if m == rem.len() || rem[m] < label[m] {
            // the previous key ran out inside the label (or sorts below it):
            // everything through this node is greater, take the smallest
            key.truncate(off);
            return descend_min(node, from, key);
        }
        // the label sorts below the previous key: nothing here
        return false;
    }
    if m == rem.len() {
        // the previous key ends exactly at this node: its successor is the
        // smallest key strictly below
        let ct = n.childs();
        if ct.is_empty() {
            return false;
        }
        key.push(ct.first_at(0));
        let child = ct.child_at(0);
        child.as_ref().lock.read();
        let r = descend_min(child, 0, key);
        child.as_ref().lock.unlock_read();
        return r;
    }
    // the previous key continues below: probe the child it went through, then
    // fall back to the next sibling (on a miss the search position already is
    // the first strictly-greater sibling)
    let ct = n.childs();
    if ct.is_empty() {
        return false;
    }
    let (found, pos) = ct.search(key[off + m]);
    let mut next = pos;
    if found {
        let child = ct.child_at(pos);
        child.as_ref().lock.read();
        let r = descend_next(child, 0, off + m + 1, key);
        child.as_ref().lock.unlock_read();
        if r {
            return true;
        }
        next = pos + 1;
    }
    if next == ct.len() {
        return false;
    }
    key.truncate(off + m);
    key.push(ct.first_at(next));
    let child = ct.child_at(next);
    child.as_ref().lock.read();
    let r = descend_min(child, 0, key);
    child.as_ref().lock.unlock_read();
    r
}

/// Forward iterator over every stored key in strict lexicographic order. See
/// the module notes for the concurrency contract
pub struct Keys<'t> {
    t: &'t Trie,
    key: Vec<u8>,
    start: bool,
    done: bool,
}

impl<'t> Keys<'t> {
    pub(super) fn new(t: &'t Trie) -> Self {
        Self {
            t,
            key: Vec::new(),
            start: true,
            done: false,
        }
    }
}

impl<'t> Iterator for Keys<'t> {
    type Item = Vec<u8>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let root = NonNull::from(&self.t.root);
        unsafe {
            // UNSAFE(@ohsayan): shared hold taken here; the helpers keep the
            // descent path locked and release everything below before returning
            root.as_ref().lock.read();
            let got = if self.start {
                self.key.clear();
                descend_min(root, 0, &mut self.key)
            } else {
                descend_next(root, 0, 0, &mut self.key)
            };
            root.as_ref().lock.unlock_read();
            if got {
                self.start = false;
                Some(self.key.clone())
            } else {
                self.done = true;
                self.key.clear();
                None
            }
        }
    }
}

/// Forward iterator over the suffixes completing a fixed prefix, in strict
/// lexicographic order. The yielded buffers hold only the bytes *after* the
/// prefix
pub struct Suffixes<'t> {
    t: &'t Trie,
    prefix: Box<[u8]>,
    suffix: Vec<u8>,
    start: bool,
    done: bool,
}

impl<'t> Suffixes<'t> {
    pub(super) fn new(t: &'t Trie, prefix: &[u8]) -> Self {
        Self {
            t,
            prefix: prefix.into(),
            suffix: Vec::new(),
            start: true,
            done: false,
        }
    }
    /// Walk down to the node holding the resume point for the prefix. On a hit
    /// returns the node (read-locked) and the offset of the prefix end inside
    /// its label
    ///
    /// ## Safety
    /// Locks are managed internally; on `Some` the returned node is the only
    /// one still held
    unsafe fn locate(&self) -> Option<(NonNull<Node>, usize)> {
        let mut node = NonNull::from(&self.t.root);
        let mut arr = &self.prefix[..];
        node.as_ref().lock.read();
        loop {
            let n = node.as_ref();
            let label = n.data().label().as_slice();
            let m = first_mismatch(arr, label);
            if m == arr.len() {
                // the prefix ends at (or inside) this node
                return Some((node, m));
            }
            if m == label.len() {
                let (found, pos) = n.childs().search(arr[m]);
                if found {
                    let child = n.childs().child_at(pos);
                    child.as_ref().lock.read();
                    n.lock.unlock_read();
                    node = child;
                    arr = &arr[m + 1..];
                    continue;
                }
            }
            n.lock.unlock_read();
            return None;
        }
    }
}

impl<'t> Iterator for Suffixes<'t> {
    type Item = Vec<u8>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        unsafe {
            // UNSAFE(@ohsayan): locate() hands back a read-locked node
            let got = match self.locate() {
                Some((node, from)) => {
                    let r = if self.start {
                        self.suffix.clear();
                        descend_min(node, from, &mut self.suffix)
                    } else {
                        descend_next(node, from, 0, &mut self.suffix)
                    };
                    node.as_ref().lock.unlock_read();
                    r
                }
                None => false,
            };
            if got {
                self.start = false;
                Some(self.suffix.clone())
            } else {
                self.done = true;
                self.suffix.clear();
                None
            }
        }
    }
}
