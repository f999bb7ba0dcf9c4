/*
 * Created on Tue Feb 13 2024
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

use std::{fmt, io::Error as IoError};

pub type TrieResult<T> = Result<T, TrieError>;

#[derive(Debug)]
/// Persistence errors. Everything that can go wrong inside the in-memory tree
/// is either absorbed (idempotent no-ops) or internal (lock upgrade races), so
/// the only fallible surface is the serializer.
pub enum TrieError {
    /// an I/O error from the underlying stream
    Io(IoError),
    /// the stream does not begin with the expected magic
    BadMagic,
    /// the stream ended in the middle of a node record
    IncompleteRecord,
    /// a length tag that is illegal in its position (zero or `i32::MIN` on a
    /// non-root record)
    IllegalLenTag,
    /// a negative child count, an oversized child count or a child table that
    /// is not strictly ordered by first byte
    CorruptedChildTable,
}

impl From<IoError> for TrieError {
    fn from(e: IoError) -> Self {
        Self::Io(e)
    }
}

impl fmt::Display for TrieError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::BadMagic => write!(f, "bad magic"),
            Self::IncompleteRecord => write!(f, "incomplete node record"),
            Self::IllegalLenTag => write!(f, "illegal length tag"),
            Self::CorruptedChildTable => write!(f, "corrupted child table"),
        }
    }
}

impl std::error::Error for TrieError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl TrieError {
    /// Kind equality (ignores the payload of [`TrieError::Io`])
    pub fn kind_eq(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}
