/*
 * Created on Mon Feb 12 2024
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

//! # Skytrie
//!
//! A concurrent radix trie (compressed prefix tree) storing a set of byte
//! strings. Reads run in parallel under per-node shared locks; writers
//! descend hand-over-hand under upgradable locks and promote to exclusive
//! only on the node they mutate. The tree serializes to a compact recursive
//! binary image (see [`Trie::write_to`]).
//!
//! ```
//! use skytrie::{SuffixMatch, Trie};
//!
//! let t = Trie::new();
//! t.add(b"cat");
//! t.add(b"cats");
//! t.add(b"carpet");
//! assert!(t.contains(b"cat"));
//! assert_eq!(t.suffix_of(b"carp"), SuffixMatch::Found(b"et".to_vec()));
//! let all: Vec<Vec<u8>> = t.keys().collect();
//! assert_eq!(all, [b"carpet".to_vec(), b"cat".to_vec(), b"cats".to_vec()]);
//! ```

#![deny(unreachable_patterns)]

#[macro_use]
mod macros;

mod error;
mod mem;
mod sync;
mod trie;

pub use {
    error::{TrieError, TrieResult},
    trie::{
        io::MAGIC,
        iter::{Keys, Suffixes},
        SuffixMatch, Trie,
    },
};
