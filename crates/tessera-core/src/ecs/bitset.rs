// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Implements the growable bitset used as an arbitrary-precision identifier key.

use std::fmt;

/// The identifier a registry hands out for one string key.
///
/// It is the position of a single set bit. Because [`KeySet`] grows on demand,
/// there is no cap on how many identifiers can be live at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(pub u32);

impl Identifier {
    /// Returns a key set holding only this identifier's bit.
    pub fn key(self) -> KeySet {
        let mut key = KeySet::new();
        key.set(self);
        key
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A bitset wrapped around a `Vec<u64>`, acting as an unbounded unsigned integer.
///
/// A composite key is the bitwise OR of the identifiers an entity currently
/// holds in one domain. The backing vector never ends in a zero word, so two
/// sets with the same bits compare and hash equal and can key a map.
#[derive(Default, Clone, PartialEq, Eq, Hash)]
pub struct KeySet {
    bits: Vec<u64>,
}

impl KeySet {
    /// Creates a new, empty key set.
    pub fn new() -> Self {
        Self { bits: Vec::new() }
    }

    /// Builds a key set from a list of identifiers.
    pub fn from_identifiers(ids: impl IntoIterator<Item = Identifier>) -> Self {
        let mut key = Self::new();
        for id in ids {
            key.set(id);
        }
        key
    }

    /// Sets the bit for `id`.
    pub fn set(&mut self, id: Identifier) {
        let word_idx = (id.0 / 64) as usize;
        let bit_idx = id.0 % 64;

        // Ensure the vector is large enough to hold the bit.
        if word_idx >= self.bits.len() {
            self.bits.resize(word_idx + 1, 0);
        }

        self.bits[word_idx] |= 1u64 << bit_idx;
    }

    /// Clears the bit for `id`.
    pub fn clear(&mut self, id: Identifier) {
        let word_idx = (id.0 / 64) as usize;
        let bit_idx = id.0 % 64;

        if word_idx < self.bits.len() {
            self.bits[word_idx] &= !(1u64 << bit_idx);
            self.trim();
        }
    }

    /// Returns true if the bit for `id` is set.
    pub fn is_set(&self, id: Identifier) -> bool {
        let word_idx = (id.0 / 64) as usize;
        let bit_idx = id.0 % 64;

        self.bits
            .get(word_idx)
            .map_or(false, |word| word & (1u64 << bit_idx) != 0)
    }

    /// Returns true if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Returns the number of set bits.
    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Performs a bitwise OR with another key set.
    pub fn union_with(&mut self, other: &KeySet) {
        if other.bits.len() > self.bits.len() {
            self.bits.resize(other.bits.len(), 0);
        }
        for (word, theirs) in self.bits.iter_mut().zip(&other.bits) {
            *word |= theirs;
        }
    }

    /// Performs a bitwise AND with another key set.
    pub fn intersect(&mut self, other: &KeySet) {
        let len = self.bits.len().min(other.bits.len());
        for i in 0..len {
            self.bits[i] &= other.bits[i];
        }
        // If other is shorter, the rest of self bits must be cleared.
        self.bits.truncate(len);
        self.trim();
    }

    /// `(target & self) == target`: every bit of `target` is also set here.
    pub fn contains_all(&self, target: &KeySet) -> bool {
        target
            .bits
            .iter()
            .enumerate()
            .all(|(i, word)| self.bits.get(i).copied().unwrap_or(0) & word == *word)
    }

    /// `(target & self) > 0`: at least one bit is shared.
    pub fn intersects(&self, target: &KeySet) -> bool {
        self.bits
            .iter()
            .zip(&target.bits)
            .any(|(mine, theirs)| mine & theirs != 0)
    }

    /// `!(self & target)`: no bit is shared.
    pub fn is_disjoint(&self, target: &KeySet) -> bool {
        !self.intersects(target)
    }

    /// Iterates the identifiers whose bits are set, lowest first.
    pub fn iter(&self) -> impl Iterator<Item = Identifier> + '_ {
        self.bits.iter().enumerate().flat_map(|(word_idx, word)| {
            let word = *word;
            (0..64u32)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| Identifier(word_idx as u32 * 64 + bit))
        })
    }

    fn trim(&mut self) {
        while self.bits.last() == Some(&0) {
            self.bits.pop();
        }
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|id| id.0)).finish()
    }
}
