//! Keyed read cache with whole-entry invalidation.
//!
//! # Design
//! Entries are never patched in place: a value is either stored wholesale
//! from a fetch or marked stale. Each entry carries a generation counter that
//! `invalidate` bumps; a fetch records the generation it started under and
//! `store` refuses its result if an invalidation happened meanwhile. That
//! keeps a slow fetch issued before a mutation from overwriting the cache
//! with pre-mutation data.

use std::collections::HashMap;

#[derive(Debug)]
struct Entry<T> {
    value: Option<T>,
    stale: bool,
    generation: u64,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            value: None,
            stale: true,
            generation: 0,
        }
    }
}

#[derive(Debug)]
pub struct QueryCache<T> {
    entries: HashMap<&'static str, Entry<T>>,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Clone> QueryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored value, only if it has not been invalidated.
    pub fn fresh(&self, key: &'static str) -> Option<T> {
        self.entries
            .get(key)
            .filter(|entry| !entry.stale)
            .and_then(|entry| entry.value.clone())
    }

    /// The stored value even when stale, for display while a refetch runs.
    pub fn peek(&self, key: &'static str) -> Option<T> {
        self.entries.get(key).and_then(|entry| entry.value.clone())
    }

    pub fn is_stale(&self, key: &'static str) -> bool {
        self.entries.get(key).map_or(true, |entry| entry.stale)
    }

    /// Generation a fetch should pass back to `store`.
    pub fn generation(&self, key: &'static str) -> u64 {
        self.entries.get(key).map_or(0, |entry| entry.generation)
    }

    /// Store a fetched value. Returns false, leaving the entry untouched, when
    /// the entry was invalidated after `generation` was taken.
    pub fn store(&mut self, key: &'static str, generation: u64, value: T) -> bool {
        let entry = self.entries.entry(key).or_default();
        if entry.generation != generation {
            return false;
        }
        entry.value = Some(value);
        entry.stale = false;
        true
    }

    pub fn invalidate(&mut self, key: &'static str) {
        let entry = self.entries.entry(key).or_default();
        entry.stale = true;
        entry.generation += 1;
    }

    /// Forget the value entirely. In-flight fetches are also fenced off.
    pub fn reset(&mut self, key: &'static str) {
        let entry = self.entries.entry(key).or_default();
        entry.value = None;
        entry.stale = true;
        entry.generation += 1;
    }
}
