//! Cache Module
//!
//! Bounded in-memory map from key to its most recently resolved value.
//!
//! ## Responsibilities
//! - Short-circuit repeated reads without scanning segments
//! - Stay consistent with disk: updated on every write and every resolved miss
//! - Hold at most `capacity` entries, evicting the least recently used
//!
//! ## Data Structure Choice
//! `HashMap` for lookups plus a `BTreeMap` keyed by a monotonically
//! increasing access tick for recency order. Touching an entry moves it to
//! a fresh tick; eviction pops the smallest tick. Both are O(log n).
//!
//! The cache has no lock of its own. The segment manager keeps it inside
//! its state and only touches it while holding the state lock.

mod lru;

pub use lru::{CacheStats, LruCache};
