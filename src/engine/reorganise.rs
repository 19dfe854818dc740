//! Reorganisation
//!
//! Full rebuild of the three areas: tombstones disappear, overflow chains
//! fold back into the main pages, the sparse index is rebuilt, and pages
//! are left partially filled so the store can absorb inserts again.
//!
//! The rebuild is staged: the new areas are written to `temp_*.db` files
//! and the live areas stay untouched until everything is complete, so any
//! I/O failure aborts with the old state intact. The commit then swaps
//! the in-memory handles and renames the staged files over the primary
//! paths.

use std::fs;
use std::mem;

use crate::cache::{PageCache, PageHandle};
use crate::error::Result;
use crate::page::{DataPage, IndexEntry, OverflowRef, PageEntry};

use super::database::{Database, IndexArea, MainArea, OverflowArea};

impl Database {
    /// Rebuild all three areas, eliminating tombstones and overflow
    /// chains and restoring the configured fill factor.
    pub fn reorganise(&mut self) -> Result<()> {
        tracing::info!("reorganising");

        let staged = self.build_staged()?;
        self.commit_staged(staged)?;

        tracing::info!(
            main_pages = self.main_area.number_of_pages(),
            index_pages = self.index_area.number_of_pages(),
            overflow_pages = self.overflow_area.number_of_pages(),
            "reorganised"
        );
        Ok(())
    }

    /// Build the replacement areas on the staged paths. The live areas are
    /// only read; an error here leaves them exactly as they were.
    fn build_staged(&mut self) -> Result<(IndexArea, MainArea, OverflowArea)> {
        let dir = self.config.data_dir.clone();
        let mut new_index: IndexArea = PageCache::open(&dir.join(Self::STAGED_INDEX_FILE), true, "index")?;
        let mut new_main = PageCache::open(&dir.join(Self::STAGED_MAIN_FILE), true, "main")?;
        let mut new_overflow =
            PageCache::open(&dir.join(Self::STAGED_OVERFLOW_FILE), true, "overflow")?;

        // Stream every surviving entry into the new main area in global
        // key order: the Guardian's chain first (its keys precede every
        // indexed key), then each old page with each entry's chain spliced
        // in right after it.
        {
            let mut packer = Packer::new(&mut new_main, self.config.entries_after_reorganisation())?;

            for entry in self.gather_chain(self.guardian)? {
                packer.push(entry)?;
            }

            let main_pages = self.main_area.number_of_pages();
            for page_index in 0..main_pages {
                let handle = self.main_area.page(page_index)?;
                let entries = handle.read().occupied().to_vec();
                drop(handle);

                for entry in entries {
                    if !entry.deleted {
                        packer.push(entry)?;
                    }
                    // A tombstone's chain still holds live entries.
                    if entry.overflow.is_some() {
                        for chained in self.gather_chain(entry.overflow)? {
                            packer.push(chained)?;
                        }
                    }
                }
            }
        }

        // One sparse-index entry per rebuilt main page, in page order.
        {
            let mut current = new_index.page(0)?;
            for page_index in 0..new_main.number_of_pages() {
                let first_key = new_main.page(page_index)?.read().entries[0].key;
                if current.read().is_full() {
                    current = new_index.create_page()?;
                }
                current.write().push(IndexEntry::new(first_key, page_index));
            }
        }

        // Pre-allocate overflow capacity proportional to the rebuilt main
        // area, so near-term inserts have room immediately.
        let want = ((new_main.number_of_pages() as f64) * self.config.overflow_ratio).ceil() as u64;
        while new_overflow.number_of_pages() < want.max(1) {
            let _page = new_overflow.create_page()?;
        }

        // Every chain was folded back into the main pages.
        new_main.header_mut().overflow_head = OverflowRef::NONE;

        new_index.flush()?;
        new_main.flush()?;
        new_overflow.flush()?;

        Ok((new_index, new_main, new_overflow))
    }

    /// Swap the staged areas in and replace the primary files on disk.
    /// The superseded caches are dropped (and close their files) before
    /// the renames.
    fn commit_staged(&mut self, staged: (IndexArea, MainArea, OverflowArea)) -> Result<()> {
        let (new_index, new_main, new_overflow) = staged;

        let old_index = mem::replace(&mut self.index_area, new_index);
        let old_main = mem::replace(&mut self.main_area, new_main);
        let old_overflow = mem::replace(&mut self.overflow_area, new_overflow);

        self.index_area.absorb_stats(old_index.stats());
        self.main_area.absorb_stats(old_main.stats());
        self.overflow_area.absorb_stats(old_overflow.stats());

        drop(old_index);
        drop(old_main);
        drop(old_overflow);

        let dir = self.config.data_dir.clone();
        fs::rename(dir.join(Self::STAGED_INDEX_FILE), dir.join(Self::INDEX_FILE))?;
        fs::rename(dir.join(Self::STAGED_MAIN_FILE), dir.join(Self::MAIN_FILE))?;
        fs::rename(dir.join(Self::STAGED_OVERFLOW_FILE), dir.join(Self::OVERFLOW_FILE))?;

        self.guardian = OverflowRef::NONE;
        Ok(())
    }

    /// Collect the live entries of a chain in order, chain refs cleared.
    fn gather_chain(&mut self, start: OverflowRef) -> Result<Vec<PageEntry>> {
        let mut entries = Vec::new();

        let mut current = start;
        while current.is_some() {
            let entry = self.overflow_entry(current)?;
            current = entry.overflow;
            if !entry.deleted {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

/// Packs a key-ordered entry stream into fresh main pages, starting a new
/// page whenever the current one reaches the target fill.
struct Packer<'a> {
    area: &'a mut MainArea,
    current: PageHandle<DataPage>,
    fill_target: usize,
}

impl<'a> Packer<'a> {
    fn new(area: &'a mut MainArea, fill_target: usize) -> Result<Self> {
        let current = area.page(0)?;
        Ok(Self {
            area,
            current,
            fill_target,
        })
    }

    fn push(&mut self, mut entry: PageEntry) -> Result<()> {
        if self.current.read().len() >= self.fill_target {
            self.current = self.area.create_page()?;
        }
        entry.overflow = OverflowRef::NONE;
        self.current.write().push(entry);
        Ok(())
    }
}
