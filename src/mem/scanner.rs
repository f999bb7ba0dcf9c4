/*
 * Created on Wed Feb 14 2024
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

pub type BufferedScanner<'a> = Scanner<'a, u8>;

#[derive(Debug, PartialEq)]
/// A scanner over a slice buffer `[T]`
pub struct Scanner<'a, T> {
    d: &'a [T],
    __cursor: usize,
}

impl<'a, T> Scanner<'a, T> {
    /// Create a new scanner, starting at position 0
    pub const fn new(d: &'a [T]) -> Self {
        Self { d, __cursor: 0 }
    }
}

impl<'a, T> Scanner<'a, T> {
    pub const fn buffer_len(&self) -> usize {
        self.d.len()
    }
    /// Returns the remaining number of **items**
    pub const fn remaining(&self) -> usize {
        self.buffer_len() - self.__cursor
    }
    /// Returns true if the scanner has reached eof
    pub fn eof(&self) -> bool {
        self.remaining() == 0
    }
    /// Returns true if the scanner has atleast `sizeof` items remaining
    pub fn has_left(&self, sizeof: usize) -> bool {
        self.remaining() >= sizeof
    }
}

impl<'a> Scanner<'a, u8> {
    /// Attempt to return a fixed-size block from the current position, moving
    /// the cursor ahead on success
    pub fn try_next_block<const N: usize>(&mut self) -> Option<[u8; N]> {
        if !self.has_left(N) {
            return None;
        }
        let mut b = [0u8; N];
        b.copy_from_slice(&self.d[self.__cursor..self.__cursor + N]);
        self.__cursor += N;
        Some(b)
    }
    /// Attempt to return a chunk of `l` bytes from the current position, moving
    /// the cursor ahead on success
    pub fn try_next_chunk(&mut self, l: usize) -> Option<&'a [u8]> {
        if !self.has_left(l) {
            return None;
        }
        let chunk = &self.d[self.__cursor..self.__cursor + l];
        self.__cursor += l;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::Scanner;

    #[test]
    fn scan_blocks_and_chunks() {
        let buf = [1u8, 2, 3, 4, 5, 6];
        let mut s = Scanner::new(&buf[..]);
        assert_eq!(s.try_next_block::<4>().unwrap(), [1, 2, 3, 4]);
        assert_eq!(s.try_next_chunk(2).unwrap(), &[5, 6]);
        assert!(s.eof());
    }

    #[test]
    fn scan_past_eof() {
        let buf = [1u8, 2, 3];
        let mut s = Scanner::new(&buf[..]);
        assert!(s.try_next_block::<4>().is_none());
        // a failed probe does not move the cursor
        assert_eq!(s.remaining(), 3);
        assert_eq!(s.try_next_chunk(3).unwrap(), &[1, 2, 3]);
        assert!(s.try_next_chunk(1).is_none());
        assert!(s.try_next_chunk(0).unwrap().is_empty());
    }
}
