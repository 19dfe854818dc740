//! Page cache implementation
//!
//! A small arena of shared page slots backed by one [`DurableFile`].
//! Pinning is explicit: checking a page out bumps the slot's pin counter
//! and dropping the handle releases it; eviction only ever touches slots
//! with no outstanding pins.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::path::Path;
use std::rc::Rc;

use crate::error::{Result, StrataError};
use crate::file::DurableFile;
use crate::stats::AreaStats;

use super::{DiskHeader, DiskPage, CACHE_SLOTS};

// =============================================================================
// Slots and Handles
// =============================================================================

/// One occupied cache slot
struct Slot<P> {
    page: Rc<RefCell<P>>,
    /// Live handles to this slot; 0 means evictable
    pins: Rc<Cell<usize>>,
    /// Set on mutable checkout; cleared when the page reaches disk
    dirty: Rc<Cell<bool>>,
}

impl<P> Slot<P> {
    fn new(page: P, dirty: bool) -> Self {
        Self {
            page: Rc::new(RefCell::new(page)),
            pins: Rc::new(Cell::new(0)),
            dirty: Rc::new(Cell::new(dirty)),
        }
    }

    /// Lease this slot out, bumping its pin count
    fn checkout(&self) -> PageHandle<P> {
        self.pins.set(self.pins.get() + 1);
        PageHandle {
            page: Rc::clone(&self.page),
            pins: Rc::clone(&self.pins),
            dirty: Rc::clone(&self.dirty),
        }
    }
}

/// A pinned lease on a cached page.
///
/// All handles to the same page share one in-memory copy, so a mutation
/// through one handle is visible through every other. The slot stays
/// pinned until the last handle is dropped.
pub struct PageHandle<P> {
    page: Rc<RefCell<P>>,
    pins: Rc<Cell<usize>>,
    dirty: Rc<Cell<bool>>,
}

impl<P> PageHandle<P> {
    /// Shared read access to the page
    pub fn read(&self) -> Ref<'_, P> {
        self.page.borrow()
    }

    /// Exclusive write access; marks the slot dirty
    pub fn write(&self) -> RefMut<'_, P> {
        self.dirty.set(true);
        self.page.borrow_mut()
    }
}

impl<P> Clone for PageHandle<P> {
    fn clone(&self) -> Self {
        self.pins.set(self.pins.get() + 1);
        Self {
            page: Rc::clone(&self.page),
            pins: Rc::clone(&self.pins),
            dirty: Rc::clone(&self.dirty),
        }
    }
}

impl<P> Drop for PageHandle<P> {
    fn drop(&mut self) {
        self.pins.set(self.pins.get() - 1);
    }
}

// =============================================================================
// Page Cache
// =============================================================================

/// Fixed-capacity page cache over one area file
pub struct PageCache<P: DiskPage, H: DiskHeader> {
    /// Area label, used in errors, stats and trace output
    area: &'static str,
    file: DurableFile,
    /// In-memory header; persisted at offset 0 on flush
    header: H,
    slots: Vec<Option<Slot<P>>>,
    stats: AreaStats,
}

impl<P: DiskPage, H: DiskHeader> PageCache<P, H> {
    /// Open an area file, bootstrapping it when no header exists yet.
    ///
    /// A fresh (or truncated) file gets a default header and an eagerly
    /// materialized page 0; an existing file has its header decoded and
    /// page 0 loaded into the first slot.
    pub fn open(path: &Path, truncate: bool, area: &'static str) -> Result<Self> {
        let mut cache = Self {
            area,
            file: DurableFile::open(path, truncate)?,
            header: H::default(),
            slots: (0..CACHE_SLOTS).map(|_| None).collect(),
            stats: AreaStats::default(),
        };

        let mut buf = vec![0u8; H::ENCODED_SIZE];
        if cache.file.read(&mut buf, 0)? {
            cache.header = H::decode(&buf);
            cache.stats.record_read();
            if cache.header.number_of_pages() > 0 {
                let _root = cache.page(0)?;
            }
        } else {
            let _root = cache.create_page()?;
        }

        Ok(cache)
    }

    /// In-memory header
    pub fn header(&self) -> &H {
        &self.header
    }

    /// Mutable header; changes become durable on the next flush
    pub fn header_mut(&mut self) -> &mut H {
        &mut self.header
    }

    /// Pages currently allocated in this area
    pub fn number_of_pages(&self) -> u64 {
        self.header.number_of_pages()
    }

    /// Check out the page at `index`, loading it from disk on a miss.
    pub fn page(&mut self, index: u64) -> Result<PageHandle<P>> {
        for slot in self.slots.iter().flatten() {
            if slot.page.borrow().index() == index {
                return Ok(slot.checkout());
            }
        }

        let page = self.read_page(index)?;
        let at = self.free_or_evicted_slot()?;
        let slot = Slot::new(page, false);
        let handle = slot.checkout();
        self.slots[at] = Some(slot);
        Ok(handle)
    }

    /// Allocate and check out a zero-valued page at the next index.
    pub fn create_page(&mut self) -> Result<PageHandle<P>> {
        let at = self.free_or_evicted_slot()?;

        let index = self.header.number_of_pages();
        self.header.set_number_of_pages(index + 1);

        // Dirty from birth: the page must reach disk even if no caller
        // ever writes through a handle.
        let slot = Slot::new(P::fresh(index), true);
        let handle = slot.checkout();
        self.slots[at] = Some(slot);
        Ok(handle)
    }

    /// Persist the header and every dirty cached page.
    pub fn flush(&mut self) -> Result<()> {
        let mut buf = vec![0u8; H::ENCODED_SIZE];
        self.header.encode(&mut buf);
        self.file.write(&buf, 0)?;
        self.stats.record_write();

        for at in 0..self.slots.len() {
            let Some(slot) = &self.slots[at] else { continue };
            if !slot.dirty.get() {
                continue;
            }
            let page = *slot.page.borrow();
            let dirty = Rc::clone(&slot.dirty);
            self.write_page(&page)?;
            dirty.set(false);
        }

        self.file.flush()
    }

    /// Disk I/O counters for this area
    pub fn stats(&self) -> AreaStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Fold another counter set into this cache's counters (used when a
    /// rebuilt area takes over from the one it replaces, so the combined
    /// counters stay monotonic).
    pub fn absorb_stats(&mut self, other: AreaStats) {
        self.stats.reads += other.reads;
        self.stats.writes += other.writes;
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn page_offset(index: u64) -> u64 {
        H::ENCODED_SIZE as u64 + index * P::ENCODED_SIZE as u64
    }

    fn read_page(&mut self, index: u64) -> Result<P> {
        let mut buf = vec![0u8; P::ENCODED_SIZE];
        if !self.file.read(&mut buf, Self::page_offset(index))? {
            return Err(StrataError::Corruption(format!(
                "{} area: page {} lies past the end of {}",
                self.area,
                index,
                self.file.path().display()
            )));
        }
        self.stats.record_read();
        Ok(P::decode(&buf))
    }

    fn write_page(&mut self, page: &P) -> Result<()> {
        let mut buf = vec![0u8; P::ENCODED_SIZE];
        page.encode(&mut buf);
        self.file.write(&buf, Self::page_offset(page.index()))?;
        self.stats.record_write();
        Ok(())
    }

    /// Find a slot for a new page: the first empty one, or the first
    /// unpinned one after writing its page back if dirty.
    fn free_or_evicted_slot(&mut self) -> Result<usize> {
        if let Some(at) = self.slots.iter().position(Option::is_none) {
            return Ok(at);
        }

        let mut victim = None;
        for (at, slot) in self.slots.iter().enumerate() {
            if let Some(slot) = slot {
                if slot.pins.get() == 0 {
                    victim = Some((at, *slot.page.borrow(), slot.dirty.get()));
                    break;
                }
            }
        }

        let Some((at, page, dirty)) = victim else {
            return Err(StrataError::CacheExhausted {
                area: self.area,
                slots: CACHE_SLOTS,
            });
        };

        if dirty {
            self.write_page(&page)?;
        }
        tracing::trace!(area = self.area, page = page.index(), "evicting page");
        self.slots[at] = None;
        Ok(at)
    }
}

impl<P: DiskPage, H: DiskHeader> Drop for PageCache<P, H> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(area = self.area, error = %e, "flush on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{DataPage, Header, PageEntry};
    use tempfile::tempdir;

    fn open_cache(path: &Path) -> PageCache<DataPage, Header> {
        PageCache::open(path, false, "test").unwrap()
    }

    #[test]
    fn test_fresh_open_bootstraps_page_zero() {
        let dir = tempdir().unwrap();
        let mut cache = open_cache(&dir.path().join("area.db"));

        assert_eq!(cache.number_of_pages(), 1);
        let root = cache.page(0).unwrap();
        assert_eq!(root.read().index, 0);
        assert!(root.read().is_empty());
    }

    #[test]
    fn test_handles_share_one_page_copy() {
        let dir = tempdir().unwrap();
        let mut cache = open_cache(&dir.path().join("area.db"));

        let first = cache.page(0).unwrap();
        let second = cache.page(0).unwrap();

        first.write().push(PageEntry::new(11, 1));
        assert_eq!(second.read().occupied(), &[PageEntry::new(11, 1)]);
    }

    #[test]
    fn test_eviction_writes_back_and_reloads() {
        let dir = tempdir().unwrap();
        let mut cache = open_cache(&dir.path().join("area.db"));

        // Page 0 exists; tag it, then create enough pages to force it out.
        cache.page(0).unwrap().write().push(PageEntry::new(5, 50));
        for _ in 0..CACHE_SLOTS {
            let _page = cache.create_page().unwrap();
        }

        let reloaded = cache.page(0).unwrap();
        assert_eq!(reloaded.read().occupied(), &[PageEntry::new(5, 50)]);
    }

    #[test]
    fn test_all_slots_pinned_is_fatal() {
        let dir = tempdir().unwrap();
        let mut cache = open_cache(&dir.path().join("area.db"));

        let mut held = Vec::new();
        held.push(cache.page(0).unwrap());
        for _ in 1..CACHE_SLOTS {
            held.push(cache.create_page().unwrap());
        }

        let result = cache.create_page();
        assert!(matches!(result, Err(StrataError::CacheExhausted { .. })));
    }

    #[test]
    fn test_dropping_handle_unpins_slot() {
        let dir = tempdir().unwrap();
        let mut cache = open_cache(&dir.path().join("area.db"));

        let mut held = Vec::new();
        held.push(cache.page(0).unwrap());
        for _ in 1..CACHE_SLOTS {
            held.push(cache.create_page().unwrap());
        }

        held.pop();
        let result = cache.create_page();
        assert!(result.is_ok());
    }

    #[test]
    fn test_flush_and_reopen_persists_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("area.db");

        {
            let mut cache = open_cache(&path);
            cache.page(0).unwrap().write().push(PageEntry::new(1, 10));
            let second = cache.create_page().unwrap();
            second.write().push(PageEntry::new(2, 20));
            cache.flush().unwrap();
        }

        let mut cache = open_cache(&path);
        assert_eq!(cache.number_of_pages(), 2);
        assert_eq!(
            cache.page(0).unwrap().read().occupied(),
            &[PageEntry::new(1, 10)]
        );
        assert_eq!(
            cache.page(1).unwrap().read().occupied(),
            &[PageEntry::new(2, 20)]
        );
    }

    #[test]
    fn test_drop_flushes_without_explicit_call() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("area.db");

        {
            let mut cache = open_cache(&path);
            cache.page(0).unwrap().write().push(PageEntry::new(7, 70));
        }

        let mut cache = open_cache(&path);
        assert_eq!(
            cache.page(0).unwrap().read().occupied(),
            &[PageEntry::new(7, 70)]
        );
    }
}
