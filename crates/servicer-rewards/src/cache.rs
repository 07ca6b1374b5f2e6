// Copyright 2025 RISC Zero, Inc.
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

//! Height-keyed caches for query results.

use std::collections::VecDeque;
use std::sync::Arc;

/// Capacity-bounded list of `(height, value)` entries, most recently inserted first.
///
/// Eviction follows insertion order only: a lookup does not refresh an entry, and an insert
/// drops whatever falls past the capacity at the back.
#[derive(Debug, Clone)]
pub struct BoundedCache<V> {
    capacity: usize,
    entries: VecDeque<(u64, Arc<V>)>,
}

impl<V> BoundedCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: VecDeque::with_capacity(capacity) }
    }

    /// Returns the entry for the height, searching from the newest entry.
    pub fn get(&self, height: u64) -> Option<Arc<V>> {
        self.entries.iter().find(|(h, _)| *h == height).map(|(_, value)| value.clone())
    }

    /// Inserts the value at the front and truncates to capacity.
    pub fn insert(&mut self, height: u64, value: Arc<V>) {
        self.entries.push_front((height, value));
        self.entries.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached heights, newest first.
    pub fn heights(&self) -> Vec<u64> {
        self.entries.iter().map(|(h, _)| *h).collect()
    }
}
