//! Open-addressed hash table keyed by interned strings.
//!
//! Used, unmodified, as the global-variable environment, the per-class
//! method table, the per-instance field table, and the string-intern
//! table. Key comparison is pointer (handle) identity, never byte
//! comparison — that's what interning buys us.
//!
//! Growth follows `max(8, 2 * cap)` once `count + 1 > cap * 3 / 4`. `count`
//! is the clox-style probe-load counter: it includes stale tombstones (a
//! tombstone still occupies a slot in the probe sequence, so it still
//! costs capacity), `delete` leaves it unchanged, and `set` only
//! increments it when landing in a truly empty — not merely tombstoned —
//! bucket. A rehash resets it to the number of live entries it actually
//! reinserts (tombstones evaporate there). `count` is therefore *not* the
//! number of live keys and must not be confused with `live`, the field
//! `len()`/`is_empty()` report.


use crate::heap::Heap;
use crate::value::{ObjRef, Value};

const LOAD_FACTOR: f64 = 0.75;
const MIN_CAPACITY: usize = 8;

#[derive(Clone, Copy, Debug)]
enum Slot {
    Empty,
    Tombstone,
    Live {
        key: ObjRef,
        hash: u32,
        value: Value,
    },
}

/// A hash table from interned-string handles to [`Value`]s.
#[derive(Debug, Default, Clone)]
pub struct Table {
    entries: Vec<Slot>,
    /// Probe-load bookkeeping used only to decide when to `grow` (see
    /// module docs); includes stale tombstones and so is *not* the live
    /// key count.
    count: usize,
    /// Number of live entries. What `len()`/`is_empty()` report.
    live: usize,
}

impl Table {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            count: 0,
            live: 0,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Find the bucket for `key`/`hash`, stopping at the first empty bucket
    /// or a live entry with a matching key. Tombstones are skipped, but the
    /// first tombstone seen is remembered so insertion can reuse it.
    fn find_bucket(entries: &[Slot], key: ObjRef, hash: u32) -> usize {
        let cap = entries.len();
        let mut index = (hash as usize) % cap;
        let mut tombstone: Option<usize> = None;
        loop {
            match entries[index] {
                Slot::Empty => return tombstone.unwrap_or(index),
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Slot::Live { key: k, .. } if k == key => return index,
                Slot::Live { .. } => {}
            }
            index = (index + 1) % cap;
        }
    }

    fn grow(&mut self) {
        let new_cap = (self.capacity() * 2).max(MIN_CAPACITY);
        let old_entries = core::mem::replace(&mut self.entries, vec![Slot::Empty; new_cap]);
        self.count = 0;
        for slot in old_entries {
            if let Slot::Live { key, hash, value } = slot {
                let idx = Self::find_bucket(&self.entries, key, hash);
                self.entries[idx] = Slot::Live { key, hash, value };
                self.count += 1;
            }
        }
    }

    /// Look up `key`.
    #[must_use]
    pub fn get(&self, key: ObjRef, hash: u32) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        match self.entries[Self::find_bucket(&self.entries, key, hash)] {
            Slot::Live { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Insert or overwrite `key -> value`. Returns `true` iff `key` was not
    /// already present (a brand new key was added).
    pub fn set(&mut self, key: ObjRef, hash: u32, value: Value) -> bool {
        if (self.count + 1) as f64 > self.capacity() as f64 * LOAD_FACTOR {
            self.grow();
        }
        let idx = Self::find_bucket(&self.entries, key, hash);
        let is_new_key = !matches!(self.entries[idx], Slot::Live { .. });
        if matches!(self.entries[idx], Slot::Empty) {
            self.count += 1;
        }
        if is_new_key {
            self.live += 1;
        }
        self.entries[idx] = Slot::Live { key, hash, value };
        is_new_key
    }

    /// Replace `key`'s bucket with a tombstone. `count` (the probe-load
    /// counter) is unchanged; `live` drops by one.
    pub fn delete(&mut self, key: ObjRef, hash: u32) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let idx = Self::find_bucket(&self.entries, key, hash);
        if matches!(self.entries[idx], Slot::Live { .. }) {
            self.entries[idx] = Slot::Tombstone;
            self.live -= 1;
            true
        } else {
            false
        }
    }

    /// Copy every live entry of `self` into `dst` via `dst.set`.
    pub fn add_all(&self, dst: &mut Table) {
        for slot in &self.entries {
            if let Slot::Live { key, hash, value } = *slot {
                dst.set(key, hash, value);
            }
        }
    }

    /// The only lookup keyed by raw bytes rather than a handle; used
    /// exclusively by the interner to find an existing interned string with
    /// matching length, hash, and bytes.
    #[must_use]
    pub fn find_string(&self, heap: &Heap, chars: &str, hash: u32) -> Option<ObjRef> {
        if self.entries.is_empty() {
            return None;
        }
        let cap = self.capacity();
        let mut index = (hash as usize) % cap;
        loop {
            match self.entries[index] {
                Slot::Empty => return None,
                Slot::Live {
                    key,
                    hash: entry_hash,
                    ..
                } if entry_hash == hash => {
                    if let crate::value::Obj::String(s) = heap.get(key) {
                        if s.chars.as_ref() == chars {
                            return Some(key);
                        }
                    }
                }
                Slot::Tombstone | Slot::Live { .. } => {}
            }
            index = (index + 1) % cap;
        }
    }

    /// Delete any entry whose key is an unmarked string. Used on the intern
    /// table between the trace and sweep phases of garbage collection so
    /// the table holds only weak references to strings.
    pub fn remove_white(&mut self, heap: &Heap) {
        for slot in &mut self.entries {
            if let Slot::Live { key, .. } = *slot {
                if !heap.is_marked(key) {
                    *slot = Slot::Tombstone;
                }
            }
        }
    }

    /// Mark every key and every value reachable through this table.
    pub fn mark_table(&self, heap: &mut Heap) {
        for slot in &self.entries {
            if let Slot::Live { key, value, .. } = *slot {
                heap.mark_object(key);
                heap.mark_value(value);
            }
        }
    }

    /// Iterate over live `(key, value)` pairs. Iteration order is an
    /// artifact of bucket layout and must never be exposed to programs.
    pub fn iter(&self) -> impl Iterator<Item = (ObjRef, Value)> + '_ {
        self.entries.iter().filter_map(|slot| match *slot {
            Slot::Live { key, value, .. } => Some((key, value)),
            _ => None,
        })
    }
}
