//! # StrataKV
//!
//! An indexed-sequential (ISAM-style) key-value storage engine with:
//! - A sparse index area mapping start keys to primary pages
//! - A sorted main area holding the primary records
//! - An overflow area of key-sorted linked chains for out-of-place inserts
//! - Fixed-capacity page caches with pin-gated eviction per area
//! - Periodic reorganisation restoring a compact, purely-indexed layout
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Command Interpreter                         │
//! │            (interactive / script-file input)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Database                                │
//! │   search / insert / update / remove / reorganise / flush     │
//! └───────┬──────────────────┬──────────────────┬───────────────┘
//!         │                  │                  │
//!         ▼                  ▼                  ▼
//!  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//!  │ Index Area  │    │  Main Area  │    │  Overflow   │
//!  │ (PageCache) │    │ (PageCache) │    │    Area     │
//!  └──────┬──────┘    └──────┬──────┘    └──────┬──────┘
//!         │                  │                  │
//!         ▼                  ▼                  ▼
//!     index.db           main.db           overflow.db
//!                   (one DurableFile each)
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod file;
pub mod page;
pub mod cache;
pub mod stats;
pub mod engine;

pub mod command;
pub mod keygen;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StrataError};
pub use config::Config;
pub use engine::Database;
pub use stats::DiskStats;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StrataKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
