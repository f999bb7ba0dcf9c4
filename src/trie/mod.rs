/*
 * Created on Sat Feb 17 2024
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

mod childs;
mod data;
pub mod io;
pub mod iter;

/*
    concurrent radix trie
    ---
    A set of byte strings stored as a compressed prefix tree. Each node holds
    the suffix of its incoming edge (the first byte of the edge -- the
    selector -- lives in the parent's child table), an end-of-key flag and an
    ordered child table. The tree invariants:

    1. child tables are strictly ordered by selector byte
    2. a node with no children is a key endpoint
    3. a non-root node with exactly one child is a key endpoint (anything else
       is merged away by remove before it returns)
    4. the set of stored keys is exactly the set of end-flagged root paths

    Readers descend hand-over-hand under shared locks. Writers descend under
    upgradable locks and promote to exclusive only on the node(s) they mutate;
    `add` couples one level, `remove` couples two (the splice happens at the
    parent). See `sync::rwlock` for the promotion protocol.
*/

use {
    self::{
        childs::ChildTable,
        data::{first_mismatch, Label, NodeData},
    },
    crate::sync::rwlock::NodeLock,
    std::{cell::UnsafeCell, fmt, mem, ptr::NonNull},
};

pub use iter::{Keys, Suffixes};

/// Outcome of a unique-completion lookup ([`Trie::suffix_of`])
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SuffixMatch {
    /// the prefix has a completion and these are the remaining bytes
    Found(Vec<u8>),
    /// the prefix is live but completes in more than one way
    Multiple,
    /// no stored key starts with the prefix
    NotFound,
}

pub(crate) struct Node {
    lock: NodeLock,
    data: UnsafeCell<NodeData>,
    childs: UnsafeCell<ChildTable>,
}

impl Node {
    fn root() -> Self {
        Self {
            lock: NodeLock::new(),
            data: UnsafeCell::new(NodeData::new_empty()),
            childs: UnsafeCell::new(ChildTable::null()),
        }
    }
    fn alloc(data: NodeData, childs: ChildTable) -> NonNull<Self> {
        unsafe {
            // UNSAFE(@ohsayan): freshly boxed, so non-null
            NonNull::new_unchecked(Box::into_raw(Box::new(Self {
                lock: NodeLock::new(),
                data: UnsafeCell::new(data),
                childs: UnsafeCell::new(childs),
            })))
        }
    }
    /// Free this node. The child table slab goes with it; child *nodes* are
    /// left alone (detach or destroy them first)
    unsafe fn dealloc(n: NonNull<Self>) {
        drop(Box::from_raw(n.as_ptr()));
    }
    /// Free an entire detached subtree (no locks; the caller guarantees sole
    /// ownership)
    unsafe fn destroy_subtree(n: NonNull<Self>) {
        for &child in n.as_ref().childs().children() {
            Self::destroy_subtree(child);
        }
        Self::dealloc(n);
    }
    #[inline(always)]
    /// ## Safety
    /// Hold at least a shared lock
    unsafe fn data(&self) -> &NodeData {
        &*self.data.get()
    }
    #[inline(always)]
    /// ## Safety
    /// Hold the exclusive lock
    #[allow(clippy::mut_from_ref)]
    unsafe fn data_mut(&self) -> &mut NodeData {
        &mut *self.data.get()
    }
    #[inline(always)]
    /// ## Safety
    /// Hold at least a shared lock
    unsafe fn childs(&self) -> &ChildTable {
        &*self.childs.get()
    }
    #[inline(always)]
    /// ## Safety
    /// Hold the exclusive lock
    #[allow(clippy::mut_from_ref)]
    unsafe fn childs_mut(&self) -> &mut ChildTable {
        &mut *self.childs.get()
    }
    #[inline(always)]
    /// The empty-trie shape: no child slab ever materialized, no label, no key.
    /// Distinct from a root whose slab was allocated and later emptied out
    ///
    /// ## Safety
    /// Hold at least a shared lock
    unsafe fn is_vacant_root(&self) -> bool {
        self.childs().is_null() && self.data().label().is_empty() && !self.data().is_end()
    }
}

/// A concurrent set of byte strings backed by a radix trie.
///
/// All operations take `&self`; synchronization is per-node. Keys may be empty
/// and may contain any byte value including zero.
pub struct Trie {
    root: Node,
}

// UNSAFE(@ohsayan): all shared state behind the UnsafeCells is guarded by the
// per-node locks; child pointers are only ever dereferenced under a hold on
// their parent or themselves
unsafe impl Send for Trie {}
unsafe impl Sync for Trie {}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    pub fn new() -> Self {
        Self { root: Node::root() }
    }
    /// True iff no key is stored. Note that this is about the key *set*: a
    /// root that kept its (empty) child slab or a stale label through removals
    /// still counts as empty
    pub fn is_empty(&self) -> bool {
        let root = &self.root;
        root.lock.read();
        unsafe {
            // UNSAFE(@ohsayan): shared hold acquired above
            let r = !root.data().is_end() && root.childs().is_empty();
            root.lock.unlock_read();
            r
        }
    }
    /// Insert a key. Adding a key that is already present is a no-op
    pub fn add(&self, key: &[u8]) {
        let root = &self.root;
        root.lock.read_upgradable();
        unsafe {
            // UNSAFE(@ohsayan): upgradable hold acquired above; every mutation
            // below happens after promoting the owning node
            if root.is_vacant_root() {
                root.lock.promote();
                let d = root.data_mut();
                d.set_label(Label::own(key));
                d.set_end();
                *root.childs_mut() = ChildTable::alloc_empty();
                root.lock.unlock_write();
                return;
            }
            self.add_descend(NonNull::from(root), key)
        }
    }
    /// add descent: `node` is held upgradable; exactly one node gets promoted
    /// and mutated (or none, for an idempotent hit)
    unsafe fn add_descend(&self, mut node: NonNull<Node>, mut arr: &[u8]) {
        loop {
            let n = node.as_ref();
            let d = n.data();
            let label = d.label().as_slice();
            let m = first_mismatch(arr, label);
            match (m == label.len(), m == arr.len()) {
                (true, true) => {
                    // exact hit
                    if d.is_end() {
                        n.lock.unlock_upgradable();
                        return;
                    }
                    n.lock.promote();
                    n.data_mut().set_end();
                    n.lock.unlock_write();
                    return;
                }
                (true, false) => {
                    // the key continues past this node's label
                    let b = arr[m];
                    let ct = n.childs();
                    if !ct.is_empty() {
                        let (found, pos) = ct.search(b);
                        if found {
                            // lock-couple into the child
                            let child = ct.child_at(pos);
                            child.as_ref().lock.read_upgradable();
                            n.lock.unlock_upgradable();
                            node = child;
                            arr = &arr[m + 1..];
                            continue;
                        }
                        n.lock.promote();
                        let leaf = Node::alloc(
                            NodeData::key(Label::own(&arr[m + 1..])),
                            ChildTable::null(),
                        );
                        n.childs_mut().insert(pos, b, leaf);
                        n.lock.unlock_write();
                        return;
                    }
                    n.lock.promote();
                    let ct = n.childs_mut();
                    if ct.is_null() {
                        // leaf nodes never materialize a slab until they fork
                        *ct = ChildTable::alloc_empty();
                    }
                    let leaf =
                        Node::alloc(NodeData::key(Label::own(&arr[m + 1..])), ChildTable::null());
                    ct.insert(0, b, leaf);
                    n.lock.unlock_write();
                    return;
                }
                (false, true) => {
                    // the key ends inside this node's label: split, pushing the
                    // label tail (and the current children) down into one child
                    n.lock.promote();
                    let d = n.data_mut();
                    let (sel, tail) = d.label().split_tail(m);
                    let was_end = d.is_end();
                    let inherited = mem::replace(n.childs_mut(), ChildTable::alloc_empty());
                    let child = Node::alloc(NodeData::with_end(tail, was_end), inherited);
                    n.childs_mut().insert(0, sel, child);
                    d.label_mut().truncate(m);
                    d.set_end();
                    n.lock.unlock_write();
                    return;
                }
                (false, false) => {
                    // divergence inside the label: split into two siblings
                    n.lock.promote();
                    let d = n.data_mut();
                    let (sel_old, tail) = d.label().split_tail(m);
                    let sel_new = arr[m];
                    let was_end = d.is_end();
                    let inherited = mem::replace(n.childs_mut(), ChildTable::alloc_empty());
                    let old_child = Node::alloc(NodeData::with_end(tail, was_end), inherited);
                    let new_child =
                        Node::alloc(NodeData::key(Label::own(&arr[m + 1..])), ChildTable::null());
                    let ct = n.childs_mut();
                    if sel_new < sel_old {
                        ct.insert(0, sel_new, new_child);
                        ct.insert(1, sel_old, old_child);
                    } else {
                        ct.insert(0, sel_old, old_child);
                        ct.insert(1, sel_new, new_child);
                    }
                    d.label_mut().truncate(m);
                    d.clear_end();
                    n.lock.unlock_write();
                    return;
                }
            }
        }
    }
    /// Membership test
    pub fn contains(&self, key: &[u8]) -> bool {
        let mut node = NonNull::from(&self.root);
        let mut arr = key;
        unsafe {
            // UNSAFE(@ohsayan): pure hand-over-hand shared descent
            self.root.lock.read();
            loop {
                let n = node.as_ref();
                let d = n.data();
                let label = d.label().as_slice();
                let m = first_mismatch(arr, label);
                if m == label.len() && m == arr.len() {
                    let r = d.is_end();
                    n.lock.unlock_read();
                    return r;
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
                return false;
            }
        }
    }
    /// Unique-completion lookup: resolve a prefix to the one stored key it
    /// completes into, or report that there are several (or none)
    pub fn suffix_of(&self, prefix: &[u8]) -> SuffixMatch {
        let mut node = NonNull::from(&self.root);
        let mut arr = prefix;
        unsafe {
            // UNSAFE(@ohsayan): hand-over-hand shared descent
            self.root.lock.read();
            loop {
                let n = node.as_ref();
                let d = n.data();
                let label = d.label().as_slice();
                let m = first_mismatch(arr, label);
                let label_done = m == label.len();
                let arr_done = m == arr.len();
                if !label_done && !arr_done {
                    // divergence inside the label
                    n.lock.unlock_read();
                    return SuffixMatch::NotFound;
                }
                if label_done && !arr_done {
                    let (found, pos) = n.childs().search(arr[m]);
                    if !found {
                        n.lock.unlock_read();
                        return SuffixMatch::NotFound;
                    }
                    let child = n.childs().child_at(pos);
                    child.as_ref().lock.read();
                    n.lock.unlock_read();
                    node = child;
                    arr = &arr[m + 1..];
                    continue;
                }
                // the prefix ends at (or inside) this node
                if d.is_end() {
                    let r = if !label_done {
                        // ends inside the label: the label tail completes it
                        SuffixMatch::Found(label[m..].to_vec())
                    } else if n.childs().is_empty() {
                        SuffixMatch::Found(Vec::new())
                    } else {
                        SuffixMatch::Multiple
                    };
                    n.lock.unlock_read();
                    return r;
                }
                // no key ends here: the completion count is the child count,
                // so walk the single-child chain if there is one (only the
                // root may be in that shape)
                let mut suffix = label[m..].to_vec();
                loop {
                    let n = node.as_ref();
                    let ct = n.childs();
                    match ct.len() {
                        0 => {
                            // only the vacant root has this shape
                            n.lock.unlock_read();
                            return SuffixMatch::NotFound;
                        }
                        1 => {
                            suffix.push(ct.first_at(0));
                            let child = ct.child_at(0);
                            child.as_ref().lock.read();
                            n.lock.unlock_read();
                            node = child;
                            let c = node.as_ref();
                            suffix.extend_from_slice(c.data().label().as_slice());
                            if c.data().is_end() {
                                let r = if c.childs().is_empty() {
                                    SuffixMatch::Found(suffix)
                                } else {
                                    SuffixMatch::Multiple
                                };
                                c.lock.unlock_read();
                                return r;
                            }
                        }
                        _ => {
                            n.lock.unlock_read();
                            return SuffixMatch::Multiple;
                        }
                    }
                }
            }
        }
    }
    /// Remove a key. Removing an absent key is a no-op
    pub fn remove(&self, key: &[u8]) {
        let root = NonNull::from(&self.root);
        unsafe {
            // UNSAFE(@ohsayan): two-level upgradable coupling; mutations happen
            // after promoting the nodes they touch
            self.root.lock.read_upgradable();
            let mut prev: Option<(NonNull<Node>, usize)> = None;
            let mut node = root;
            let mut arr = key;
            loop {
                let n = node.as_ref();
                let d = n.data();
                let label = d.label().as_slice();
                let m = first_mismatch(arr, label);
                if m == label.len() && m == arr.len() {
                    if !d.is_end() {
                        break;
                    }
                    return self.remove_at(prev, node);
                }
                if m == label.len() && m < arr.len() {
                    let (found, pos) = n.childs().search(arr[m]);
                    if !found {
                        break;
                    }
                    let child = n.childs().child_at(pos);
                    child.as_ref().lock.read_upgradable();
                    // two levels stay held: the node (future parent of the
                    // splice) and the child; the grandparent goes
                    if let Some((p, _)) = prev {
                        p.as_ref().lock.unlock_upgradable();
                    }
                    prev = Some((node, pos));
                    node = child;
                    arr = &arr[m + 1..];
                    continue;
                }
                // key not present
                break;
            }
            node.as_ref().lock.unlock_upgradable();
            if let Some((p, _)) = prev {
                p.as_ref().lock.unlock_upgradable();
            }
        }
    }
    /// `node` holds the key: clear the flag, merge it into its only child, or
    /// unlink it, depending on its shape. `prev` (when present) is the parent
    /// with the position of `node` in its table; both are held upgradable
    unsafe fn remove_at(&self, prev: Option<(NonNull<Node>, usize)>, node: NonNull<Node>) {
        let n = node.as_ref();
        match (n.childs().len(), prev) {
            (2.., _) => {
                // the subtree still forks below this point
                n.lock.promote();
                n.data_mut().clear_end();
                n.lock.unlock_write();
                if let Some((p, _)) = prev {
                    p.as_ref().lock.unlock_upgradable();
                }
            }
            (1, Some((p, ppos))) => {
                // splice: the only child absorbs this node's edge and replaces
                // it in the parent's table
                let p = p.as_ref();
                p.lock.promote();
                n.lock.promote();
                let sel = n.childs().first_at(0);
                let child = n.childs().child_at(0);
                let c = child.as_ref();
                c.lock.write();
                let merged = Label::merge(n.data().label(), sel, c.data().label());
                c.data_mut().set_label(merged);
                c.lock.unlock_write();
                p.childs_mut().replace(ppos, child);
                n.lock.unlock_write();
                // nothing can reach the node anymore: its parent is held
                // exclusive and its readers drained during promotion
                Node::dealloc(node);
                p.lock.unlock_write();
            }
            (1, None) => {
                // root: the merged node replaces the root in place
                n.lock.promote();
                let sel = n.childs().first_at(0);
                let child = n.childs().child_at(0);
                let c = child.as_ref();
                c.lock.write();
                let merged = Label::merge(n.data().label(), sel, c.data().label());
                let end = c.data().is_end();
                let adopted = mem::replace(c.childs_mut(), ChildTable::null());
                c.lock.unlock_write();
                let d = n.data_mut();
                d.set_label(merged);
                if end {
                    d.set_end()
                } else {
                    d.clear_end()
                }
                let old = mem::replace(n.childs_mut(), adopted);
                n.lock.unlock_write();
                drop(old);
                Node::dealloc(child);
            }
            (0, Some((p, ppos))) => {
                // leaf: unlink from the parent
                let p = p.as_ref();
                p.lock.promote();
                // promoting the leaf drains any reader still parked inside it
                n.lock.promote();
                n.lock.unlock_write();
                let removed = p.childs_mut().remove(ppos);
                debug_assert_eq!(removed, node);
                Node::dealloc(removed);
                // a parent left with a single child and no key of its own gets
                // merged right away (for the root that rewrites the shared
                // prefix in place); a childless keyless parent can only be the
                // root, which sheds its stale label
                if p.childs().len() == 1 && !p.data().is_end() {
                    let sel = p.childs().first_at(0);
                    let only = p.childs().child_at(0);
                    let c = only.as_ref();
                    c.lock.write();
                    let merged = Label::merge(p.data().label(), sel, c.data().label());
                    let end = c.data().is_end();
                    let adopted = mem::replace(c.childs_mut(), ChildTable::null());
                    c.lock.unlock_write();
                    let d = p.data_mut();
                    d.set_label(merged);
                    if end {
                        d.set_end()
                    } else {
                        d.clear_end()
                    }
                    let old = mem::replace(p.childs_mut(), adopted);
                    drop(old);
                    Node::dealloc(only);
                } else if p.childs().is_empty() && !p.data().is_end() {
                    p.data_mut().set_label(Label::empty());
                }
                p.lock.unlock_write();
            }
            (0, None) => {
                // last key gone: reset the root to the vacant shape
                n.lock.promote();
                *n.data_mut() = NodeData::new_empty();
                let old = mem::replace(n.childs_mut(), ChildTable::null());
                n.lock.unlock_write();
                drop(old);
            }
        }
    }
    /// Drop every key, returning the trie to the vacant state
    pub fn clear(&self) {
        let root = &self.root;
        root.lock.write();
        unsafe {
            // UNSAFE(@ohsayan): exclusive hold on the root; the detached
            // subtrees are torn down outside the lock
            let data = mem::replace(root.data_mut(), NodeData::new_empty());
            let table = mem::replace(root.childs_mut(), ChildTable::null());
            root.lock.unlock_write();
            log::trace!("cleared trie ({} root children detached)", table.len());
            for &child in table.children() {
                Node::destroy_subtree(child);
            }
            drop(table);
            drop(data);
        }
    }
    /// Iterate every stored key in strict lexicographic order
    pub fn keys(&self) -> Keys<'_> {
        Keys::new(self)
    }
    /// Iterate, in lexicographic order, the suffix of every stored key that
    /// starts with `prefix` (the prefix bytes themselves are not repeated)
    pub fn suffixes<'t>(&'t self, prefix: &[u8]) -> Suffixes<'t> {
        Suffixes::new(self, prefix)
    }
}

impl Drop for Trie {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Trie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for key in self.keys() {
            set.entry(&String::from_utf8_lossy(&key));
        }
        set.finish()
    }
}

impl<K: AsRef<[u8]>> FromIterator<K> for Trie {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let t = Self::new();
        iter.into_iter().for_each(|key| t.add(key.as_ref()));
        t
    }
}

impl<K: AsRef<[u8]>> Extend<K> for Trie {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        iter.into_iter().for_each(|key| self.add(key.as_ref()));
    }
}

#[cfg(test)]
impl Trie {
    /// Recursive invariant sweep, read-locking each node on the way down (the
    /// debugging twin of the serializer walk)
    pub(crate) fn validate(&self) {
        unsafe {
            // UNSAFE(@ohsayan): shared holds are taken before each node is read
            self.root.lock.read();
            Self::validate_node(&self.root, true);
            self.root.lock.unlock_read();
        }
    }
    unsafe fn validate_node(n: &Node, is_root: bool) {
        let ct = n.childs();
        assert!(
            ct.firsts().windows(2).all(|w| w[0] < w[1]),
            "child table out of order"
        );
        if !is_root {
            if ct.is_empty() {
                assert!(n.data().is_end(), "dangling interior node");
            }
            if ct.len() == 1 {
                assert!(n.data().is_end(), "unmerged single-child node");
            }
        }
        for &child in ct.children() {
            let c = child.as_ref();
            c.lock.read();
            Self::validate_node(c, false);
            c.lock.unlock_read();
        }
    }
}
