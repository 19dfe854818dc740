//! Error types for StrataKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using StrataError
pub type Result<T> = std::result::Result<T, StrataError>;

/// Unified error type for StrataKV operations
#[derive(Debug, Error)]
pub enum StrataError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Page Cache Errors
    // -------------------------------------------------------------------------
    /// Every slot of an area's page cache is pinned by a live handle.
    /// The engine never holds more handles per area than the cache has
    /// slots, so this indicates broken caller discipline, not bad data.
    #[error("{area} area: no page to evict (all {slots} cache slots pinned)")]
    CacheExhausted { area: &'static str, slots: usize },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    /// A structural invariant does not hold on disk (e.g. an index entry
    /// pointing past the main area). Not recoverable.
    #[error("corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    /// Insert of a key that is already live. Callers are expected to
    /// handle this per operation (skip, report) and carry on.
    #[error("key {key} already exists")]
    DuplicateKey { key: u64 },
}
