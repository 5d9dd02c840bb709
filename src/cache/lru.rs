//! LRU cache implementation

use std::collections::{BTreeMap, HashMap};

/// Hit/miss/eviction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug)]
struct Slot {
    value: String,
    tick: u64,
}

/// Least-recently-used cache of resolved values
#[derive(Debug)]
pub struct LruCache {
    capacity: usize,
    entries: HashMap<String, Slot>,
    /// Access tick → key, oldest first
    order: BTreeMap<u64, String>,
    next_tick: u64,
    stats: CacheStats,
}

impl LruCache {
    /// Create a cache holding at most `capacity` entries (0 disables caching)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
            stats: CacheStats::default(),
        }
    }

    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    /// Look up a key, marking it most recently used
    pub fn get(&mut self, key: &str) -> Option<String> {
        let tick = self.bump();
        match self.entries.get_mut(key) {
            Some(slot) => {
                let key = self.order.remove(&slot.tick).unwrap_or_else(|| key.to_string());
                slot.tick = tick;
                self.order.insert(tick, key);
                self.stats.hits += 1;
                Some(slot.value.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or replace a value, evicting the least recently used entry
    /// when over capacity
    pub fn insert(&mut self, key: &str, value: &str) {
        if self.capacity == 0 {
            return;
        }

        let tick = self.bump();
        if let Some(slot) = self.entries.get_mut(key) {
            self.order.remove(&slot.tick);
            slot.tick = tick;
            slot.value = value.to_string();
            self.order.insert(tick, key.to_string());
            return;
        }

        self.entries.insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                tick,
            },
        );
        self.order.insert(tick, key.to_string());

        while self.entries.len() > self.capacity {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
            self.stats.evictions += 1;
        }
    }

    /// Whether a key is cached, without touching recency
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
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

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drop every entry (stats are kept)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
