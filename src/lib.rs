//! # SegKV
//!
//! An embedded, single-node key-value store with:
//! - A value heap addressed by byte offset
//! - Segmented, checksummed `key → offset` logs with size-based rotation
//! - A background compactor that merges segments and reclaims heap space
//! - A bounded LRU read cache kept consistent with disk
//! - A small TCP protocol for remote `GET` / `PUT`
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (holds an Arc<SegmentManager>)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  read(key) / write(key, value)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  SegmentManager                              │
//! │        RwLock<State>: registry · heap · active · cache       │
//! └───────┬──────────────────────┬───────────────────┬──────────┘
//!         │                      │                   │
//!         ▼                      ▼                   ▼
//!  ┌─────────────┐       ┌──────────────┐     ┌─────────────┐
//!  │  Value Heap │◀──────│ Segment Logs │     │  LRU Cache  │
//!  │  heap.dat   │offset │ segment-N.log│     │             │
//!  └─────────────┘       └──────────────┘     └─────────────┘
//!         ▲                      ▲
//!         └──── Compactor ───────┘
//!          (background thread: merge + rewrite + atomic swap)
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod codec;

pub mod storage;
pub mod cache;
pub mod manager;
pub mod network;
pub mod protocol;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{SegKvError, Result};
pub use config::{Config, SyncStrategy};
pub use manager::{CompactionStats, CompactorHandle, SegmentManager};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SegKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
