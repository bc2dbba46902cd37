// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Fixed-capacity label registry with separate chaining.

/// Default number of head buckets.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    command: usize,
}

/// Maps label names to command indices in the parsed program.
///
/// The hash is a plain byte sum modulo capacity; label counts are small
/// enough that distribution quality does not matter. Insertion appends to
/// the bucket chain, so when a name is declared twice the first declaration
/// wins on lookup.
#[derive(Debug)]
pub struct LabelMap {
    buckets: Vec<Vec<Entry>>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: vec![Vec::new(); capacity.max(1)],
        }
    }

    /// Register `id` as naming the command at `command`.
    pub fn put(&mut self, id: String, command: usize) {
        let bucket = hash(&id, self.buckets.len());
        self.buckets[bucket].push(Entry { id, command });
    }

    /// Look up a label, walking the bucket chain for the exact name.
    pub fn get(&self, id: &str) -> Option<usize> {
        let bucket = hash(id, self.buckets.len());
        self.buckets[bucket]
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.command)
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| bucket.is_empty())
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::new()
    }
}

fn hash(id: &str, capacity: usize) -> usize {
    let sum: usize = id.bytes().map(usize::from).sum();
    sum % capacity
}
