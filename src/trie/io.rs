/*
 * Created on Mon Feb 19 2024
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
    on-disk format
    ---
    [ magic "TRIE" ] [ root record ]

    Each record is, recursively:
        [ len tag : i32 ] [ payload bytes ] [ child count : i32 ] [ children... ]

    The root's payload is its label; a child's payload is its selector byte
    followed by its label, so the tag counts label_len + 1 there. A negative
    tag marks a key endpoint. The root-only `i32::MIN` sentinel encodes the
    empty-key case (a zero-length label that *is* a key); consequently a tag
    of zero or `i32::MIN` is illegal on a non-root record. Integers use the
    host's native byte order; the format is not endian-portable.

    Packing the selector in front of the label keeps the two adjacent in the
    decoded buffer, which is exactly the shape the label windows want for the
    copy-free merge on a later remove.

    Every stream interaction is checked: a short or failed read/write surfaces
    as a `TrieError` and the live tree is left untouched (decoding happens
    into a detached root which is only swapped in once complete).
*/

use {
    super::{childs::ChildTable, data::Label, data::NodeData, Node, Trie},
    crate::{
        error::{TrieError, TrieResult},
        mem::BufferedScanner,
    },
    std::{
        fs::File,
        io::{BufWriter, Read, Write},
        mem,
        path::Path,
        ptr::NonNull,
        sync::Arc,
    },
};

/// Magic prefix of a serialized trie
pub const MAGIC: [u8; 4] = *b"TRIE";

#[inline(always)]
fn root_tag(label_len: usize, end: bool) -> i32 {
    match (label_len, end) {
        (0, true) => i32::MIN,
        (l, true) => -(l as i32),
        (l, false) => l as i32,
    }
}

#[inline(always)]
fn node_tag(label_len: usize, end: bool) -> i32 {
    // the selector byte travels with the label
    let t = (label_len + 1) as i32;
    if end {
        -t
    } else {
        t
    }
}

/// Write one node record (and, recursively, its subtree)
///
/// ## Safety
/// `node` must be read-locked by the caller; it stays locked on return
unsafe fn write_node<W: Write>(node: &Node, sel: Option<u8>, w: &mut W) -> TrieResult<()> {
    let d = node.data();
    let label = d.label().as_slice();
    match sel {
        None => {
            w.write_all(&root_tag(label.len(), d.is_end()).to_ne_bytes())?;
        }
        Some(s) => {
            w.write_all(&node_tag(label.len(), d.is_end()).to_ne_bytes())?;
            w.write_all(&[s])?;
        }
    }
    w.write_all(label)?;
    let ct = node.childs();
    w.write_all(&(ct.len() as i32).to_ne_bytes())?;
    for i in 0..ct.len() {
        let child = ct.child_at(i);
        child.as_ref().lock.read();
        let r = write_node(child.as_ref(), Some(ct.first_at(i)), w);
        child.as_ref().lock.unlock_read();
        r?;
    }
    Ok(())
}

/// Tear down a detached (unpublished) table along with the subtrees it owns
///
/// ## Safety
/// No other reference to the table or its subtrees may exist
unsafe fn discard_table(t: ChildTable) {
    for &child in t.children() {
        Node::destroy_subtree(child);
    }
    drop(t);
}

/// Decoder over a fully buffered image
struct Decoder<'a> {
    s: BufferedScanner<'a>,
    nodes: usize,
}

impl<'a> Decoder<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            s: BufferedScanner::new(buf),
            nodes: 0,
        }
    }
    fn verify_magic(&mut self) -> TrieResult<()> {
        match self.s.try_next_block::<4>() {
            Some(b) if b == MAGIC => Ok(()),
            _ => Err(TrieError::BadMagic),
        }
    }
    fn next_i32(&mut self) -> TrieResult<i32> {
        self.s
            .try_next_block::<4>()
            .map(i32::from_ne_bytes)
            .ok_or(TrieError::IncompleteRecord)
    }
    fn decode_root(&mut self) -> TrieResult<(NodeData, ChildTable)> {
        let tag = self.next_i32()?;
        let (len, end) = match tag {
            i32::MIN => (0, true),
            t if t < 0 => ((-t) as usize, true),
            t => (t as usize, false),
        };
        let label = self
            .s
            .try_next_chunk(len)
            .ok_or(TrieError::IncompleteRecord)?;
        let data = NodeData::with_end(Label::own(label), end);
        let childs = self.decode_childs()?;
        Ok((data, childs))
    }
    fn decode_node(&mut self) -> TrieResult<(u8, NonNull<Node>)> {
        let tag = self.next_i32()?;
        if tag == 0 || tag == i32::MIN {
            return Err(TrieError::IllegalLenTag);
        }
        let (len, end) = if tag < 0 {
            ((-tag) as usize, true)
        } else {
            (tag as usize, false)
        };
        // one shared buffer for selector + label, keeping them adjacent
        let chunk = self
            .s
            .try_next_chunk(len)
            .ok_or(TrieError::IncompleteRecord)?;
        let buf: Arc<[u8]> = Arc::from(chunk);
        let first = buf[0];
        let label = Label::from_shared(buf, 1, len - 1);
        let childs = self.decode_childs()?;
        self.nodes += 1;
        Ok((first, Node::alloc(NodeData::with_end(label, end), childs)))
    }
    fn decode_childs(&mut self) -> TrieResult<ChildTable> {
        let count = self.next_i32()?;
        if count < 0 || count as usize > self.s.remaining() {
            return Err(TrieError::CorruptedChildTable);
        }
        let count = count as usize;
        let mut ct = if count == 0 {
            ChildTable::null()
        } else {
            ChildTable::alloc_empty()
        };
        let mut last: i16 = -1;
        for i in 0..count {
            match self.decode_node() {
                Ok((first, child)) if i16::from(first) > last => {
                    last = i16::from(first);
                    ct.insert(i, first, child);
                }
                Ok((_, child)) => {
                    // selectors must be strictly increasing
                    unsafe {
                        // UNSAFE(@ohsayan): nothing else references these
                        Node::destroy_subtree(child);
                        discard_table(ct);
                    }
                    return Err(TrieError::CorruptedChildTable);
                }
                Err(e) => {
                    unsafe {
                        // UNSAFE(@ohsayan): nothing else references the partial table
                        discard_table(ct);
                    }
                    return Err(e);
                }
            }
        }
        Ok(ct)
    }
}

impl Trie {
    /// Serialize the whole trie into `w`. The walk holds read locks down the
    /// path being written, so concurrent readers proceed and writers queue
    /// behind the subtrees still being visited
    pub fn write_to<W: Write>(&self, w: &mut W) -> TrieResult<()> {
        w.write_all(&MAGIC)?;
        let root = &self.root;
        root.lock.read();
        let r = unsafe {
            // UNSAFE(@ohsayan): shared hold acquired above
            write_node(root, None, w)
        };
        unsafe {
            // UNSAFE(@ohsayan): shared hold acquired above
            root.lock.unlock_read();
        }
        r
    }
    /// Replace the contents of this trie with a serialized image. On any
    /// decode or I/O error the live trie is untouched
    pub fn read_from<R: Read>(&self, stream: &mut R) -> TrieResult<()> {
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;
        let mut dec = Decoder::new(&raw);
        let (data, childs) = match dec.verify_magic().and_then(|()| dec.decode_root()) {
            Ok(de) => de,
            Err(e) => {
                log::error!("discarding unreadable trie image: {e}");
                return Err(e);
            }
        };
        log::debug!(
            "decoded trie image: {} nodes, {} bytes",
            dec.nodes + 1,
            raw.len()
        );
        if !dec.s.eof() {
            log::debug!("ignoring {} trailing bytes", dec.s.remaining());
        }
        unsafe {
            // UNSAFE(@ohsayan): the decoded tree is unpublished until the swap
            // below; the old tree is torn down outside the lock
            self.root.lock.write();
            let old_data = mem::replace(self.root.data_mut(), data);
            let old_childs = mem::replace(self.root.childs_mut(), childs);
            self.root.lock.unlock_write();
            discard_table(old_childs);
            drop(old_data);
        }
        Ok(())
    }
    /// Read a serialized image into a scratch trie and add each of its keys to
    /// this one. On error nothing is added
    pub fn merge_from<R: Read>(&self, stream: &mut R) -> TrieResult<()> {
        let scratch = Trie::new();
        scratch.read_from(stream)?;
        let mut merged = 0usize;
        for key in scratch.keys() {
            self.add(&key);
            merged += 1;
        }
        log::debug!("merged {merged} keys into the live trie");
        Ok(())
    }
    /// Serialize into a freshly created (or truncated) file, fsyncing before
    /// return
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> TrieResult<()> {
        let f = File::create(path)?;
        let mut w = BufWriter::new(f);
        self.write_to(&mut w)?;
        w.flush()?;
        w.get_ref().sync_all()?;
        Ok(())
    }
    /// Replace the contents of this trie with the image stored in a file
    pub fn read_from_file<P: AsRef<Path>>(&self, path: P) -> TrieResult<()> {
        let mut f = File::open(path)?;
        self.read_from(&mut f)
    }
}
