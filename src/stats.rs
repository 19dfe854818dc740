//! Disk I/O instrumentation
//!
//! Explicit counter objects threaded through the caches and the engine.
//! Diagnostics only — never part of correctness.

use std::fmt;

/// Read/write counters for a single storage area
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AreaStats {
    /// Pages (and headers) read from disk
    pub reads: u64,
    /// Pages (and headers) written to disk
    pub writes: u64,
}

impl AreaStats {
    pub fn record_read(&mut self) {
        self.reads += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Combined counters across the three areas of one database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskStats {
    pub index: AreaStats,
    pub main: AreaStats,
    pub overflow: AreaStats,
}

impl DiskStats {
    pub fn total_reads(&self) -> u64 {
        self.index.reads + self.main.reads + self.overflow.reads
    }

    pub fn total_writes(&self) -> u64 {
        self.index.writes + self.main.writes + self.overflow.writes
    }

    /// Counter deltas since an earlier snapshot (per-operation reporting)
    pub fn since(&self, earlier: &DiskStats) -> DiskStats {
        DiskStats {
            index: AreaStats {
                reads: self.index.reads - earlier.index.reads,
                writes: self.index.writes - earlier.index.writes,
            },
            main: AreaStats {
                reads: self.main.reads - earlier.main.reads,
                writes: self.main.writes - earlier.main.writes,
            },
            overflow: AreaStats {
                reads: self.overflow.reads - earlier.overflow.reads,
                writes: self.overflow.writes - earlier.overflow.writes,
            },
        }
    }
}

impl fmt::Display for DiskStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Disk operations statistics:")?;
        writeln!(f, "Index area reads: {}", self.index.reads)?;
        writeln!(f, "Index area writes: {}", self.index.writes)?;
        writeln!(f, "Main area reads: {}", self.main.reads)?;
        writeln!(f, "Main area writes: {}", self.main.writes)?;
        writeln!(f, "Overflow area reads: {}", self.overflow.reads)?;
        writeln!(f, "Overflow area writes: {}", self.overflow.writes)?;
        writeln!(f, "Combined reads: {}", self.total_reads())?;
        write!(f, "Combined writes: {}", self.total_writes())
    }
}
