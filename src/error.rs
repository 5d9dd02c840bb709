//! Error types for SegKV
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using SegKvError
pub type Result<T> = std::result::Result<T, SegKvError>;

/// Unified error type for SegKV operations
#[derive(Debug, Error)]
pub enum SegKvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // On-disk Corruption
    // -------------------------------------------------------------------------
    /// A segment log record is truncated or fails its checksum
    #[error("corrupt record in {} at byte {position}: {reason}", segment.display())]
    CorruptRecord {
        segment: PathBuf,
        position: u64,
        reason: String,
    },

    /// A heap entry declares more bytes than the heap holds
    #[error("corrupt heap entry at offset {offset}: declared {declared} bytes, {available} available")]
    CorruptHeap {
        offset: u64,
        declared: u64,
        available: u64,
    },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Request Validation
    // -------------------------------------------------------------------------
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Value too large: {size} bytes (max {max})")]
    ValueTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SegKvError {
    /// True for errors caused by damaged files rather than the environment
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            SegKvError::CorruptRecord { .. }
                | SegKvError::CorruptHeap { .. }
                | SegKvError::Corruption(_)
        )
    }
}
