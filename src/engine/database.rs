//! Core database engine
//!
//! Point operations over the index, main and overflow areas. The engine is
//! single-threaded and synchronous; the one structural rule its algorithms
//! follow is to drop a page handle before fetching another page that could
//! force an eviction in the same area.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::cache::PageCache;
use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::page::{
    DataPage, Header, IndexEntry, IndexPage, MainHeader, OverflowRef, PageEntry, PAGE_SIZE,
};

pub(super) type IndexArea = PageCache<IndexPage, Header>;
pub(super) type MainArea = PageCache<DataPage, MainHeader>;
pub(super) type OverflowArea = PageCache<DataPage, Header>;

/// Where a live entry was found by [`Database::locate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    /// Slot on a main area page
    Main { page: u64, slot: usize },
    /// Entry in the overflow area
    Overflow(OverflowRef),
}

/// Where a new entry belongs within its owning main page
enum Placement {
    /// Tail slot of the page itself
    Append,
    /// Overflow area, chained from the in-page predecessor at `anchor`
    Chain { anchor: usize },
}

/// The indexed-sequential storage engine.
///
/// Keys live either on a sorted main page, in a key-sorted overflow chain
/// hanging off a main entry, or in the Guardian's chain when they precede
/// every indexed start key. Deletes are tombstones; space comes back at
/// the next reorganisation.
pub struct Database {
    pub(super) config: Config,

    /// Runtime mirror of the Guardian persisted in the main area header
    pub(super) guardian: OverflowRef,

    pub(super) index_area: IndexArea,
    pub(super) main_area: MainArea,
    pub(super) overflow_area: OverflowArea,
}

impl Database {
    // =========================================================================
    // Area File Names
    // =========================================================================
    pub(super) const INDEX_FILE: &'static str = "index.db";
    pub(super) const MAIN_FILE: &'static str = "main.db";
    pub(super) const OVERFLOW_FILE: &'static str = "overflow.db";

    pub(super) const STAGED_INDEX_FILE: &'static str = "temp_index.db";
    pub(super) const STAGED_MAIN_FILE: &'static str = "temp_main.db";
    pub(super) const STAGED_OVERFLOW_FILE: &'static str = "temp_overflow.db";

    /// Open or create a database with the given config.
    ///
    /// On startup:
    /// 1. Create the data directory if needed
    /// 2. Open the three areas (bootstrapping empty ones)
    /// 3. Seed the index root sentinel on a fresh index
    /// 4. Pre-create the configured overflow capacity
    /// 5. Load the Guardian from the persisted main header
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let mut index_area: IndexArea =
            PageCache::open(&config.data_dir.join(Self::INDEX_FILE), false, "index")?;
        let main_area: MainArea = PageCache::open(&config.data_dir.join(Self::MAIN_FILE), false, "main")?;
        let mut overflow_area =
            PageCache::open(&config.data_dir.join(Self::OVERFLOW_FILE), false, "overflow")?;

        {
            let root = index_area.page(0)?;
            if root.read().is_empty() {
                root.write().push(IndexEntry::new(0, 0));
            }
        }

        while overflow_area.number_of_pages() < config.initial_overflow_pages {
            let _page = overflow_area.create_page()?;
        }

        let guardian = main_area.header().overflow_head;

        Ok(Self {
            config,
            guardian,
            index_area,
            main_area,
            overflow_area,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses the default config with the specified data directory.
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Close the database gracefully, persisting the Guardian and every
    /// dirty page.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    /// Persist the Guardian and flush all three areas.
    pub fn flush(&mut self) -> Result<()> {
        self.main_area.header_mut().overflow_head = self.guardian;
        self.index_area.flush()?;
        self.main_area.flush()?;
        self.overflow_area.flush()?;
        Ok(())
    }

    /// Remove every area file (including staged ones) under `data_dir`.
    /// Used to reset the environment between runs.
    pub fn delete_files(data_dir: &Path) -> Result<()> {
        let names = [
            Self::INDEX_FILE,
            Self::MAIN_FILE,
            Self::OVERFLOW_FILE,
            Self::STAGED_INDEX_FILE,
            Self::STAGED_MAIN_FILE,
            Self::STAGED_OVERFLOW_FILE,
        ];
        for name in names {
            match fs::remove_file(data_dir.join(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Look up the live value stored under `key`.
    pub fn search(&mut self, key: u64) -> Result<Option<u64>> {
        match self.locate(key)? {
            Some(location) => Ok(Some(self.entry_at(location)?.value)),
            None => Ok(None),
        }
    }

    /// Insert a new key-value pair in key order.
    ///
    /// Fails with [`StrataError::DuplicateKey`] when the key is already
    /// live. A full overflow area is not an error: the engine reorganises
    /// and retries the insert once.
    pub fn insert(&mut self, key: u64, value: u64) -> Result<()> {
        if self.search(key)?.is_some() {
            return Err(StrataError::DuplicateKey { key });
        }

        let before = self.stats();

        let fill = self.overflow_fill()?;
        if fill >= self.config.reorganise_threshold {
            tracing::info!(
                fill,
                threshold = self.config.reorganise_threshold,
                "overflow area nearly full, reorganising"
            );
            self.reorganise()?;
        }

        if !self.try_insert(key, value)? {
            tracing::info!("overflow area is full, reorganising");
            self.reorganise()?;
            if !self.try_insert(key, value)? {
                return Err(StrataError::Corruption(
                    "overflow area still full after reorganisation".into(),
                ));
            }
        }

        let spent = self.stats().since(&before);
        tracing::debug!(
            key,
            reads = spent.total_reads(),
            writes = spent.total_writes(),
            "insert disk IO"
        );
        Ok(())
    }

    /// Overwrite the value of a live key in place. No-op if absent.
    pub fn update(&mut self, key: u64, value: u64) -> Result<()> {
        match self.locate(key)? {
            Some(location) => self.modify_entry(location, |entry| entry.value = value),
            None => Ok(()),
        }
    }

    /// Tombstone a live key. No-op if absent.
    ///
    /// The entry stays in its slot (and keeps anchoring its chain) until
    /// the next reorganisation.
    pub fn remove(&mut self, key: u64) -> Result<()> {
        match self.locate(key)? {
            Some(location) => self.modify_entry(location, |entry| entry.deleted = true),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    // =========================================================================
    // Index Lookup
    // =========================================================================

    /// Resolve the main page owning `key`: the last index entry with
    /// `start_key <= key`, scanning pages and entries in order.
    ///
    /// `None` means the key precedes every indexed range and belongs to
    /// the Guardian's chain.
    fn find_index_position(&mut self, key: u64) -> Result<Option<u64>> {
        let mut owner = None;

        let index_pages = self.index_area.number_of_pages();
        'pages: for page_index in 0..index_pages {
            let handle = self.index_area.page(page_index)?;
            let entries = handle.read().occupied().to_vec();
            drop(handle);

            for entry in entries {
                if entry.start_key > key {
                    break 'pages;
                }
                owner = Some(entry.page_index);
            }
        }

        let Some(page_index) = owner else {
            return Ok(None);
        };

        if page_index >= self.main_area.number_of_pages() {
            return Err(StrataError::Corruption(format!(
                "index entry points at main page {} but the main area has {} pages",
                page_index,
                self.main_area.number_of_pages()
            )));
        }
        Ok(Some(page_index))
    }

    // =========================================================================
    // Entry Location
    // =========================================================================

    /// Find the live entry holding `key`, if any.
    fn locate(&mut self, key: u64) -> Result<Option<Location>> {
        let Some(page_index) = self.find_index_position(key)? else {
            return self.search_chain(self.guardian, key);
        };

        let handle = self.main_area.page(page_index)?;
        // Copy the occupied slots out so no main page stays pinned while
        // overflow chains are walked.
        let entries = handle.read().occupied().to_vec();
        drop(handle);

        for (slot, entry) in entries.iter().enumerate() {
            if !entry.deleted && entry.key == key {
                return Ok(Some(Location::Main {
                    page: page_index,
                    slot,
                }));
            }
            if entry.key > key {
                // The page is sorted: no later entry or chain can hold it.
                return Ok(None);
            }
            // Tombstoned anchors keep their chains until reorganisation.
            if entry.overflow.is_some() {
                if let Some(found) = self.search_chain(entry.overflow, key)? {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    /// Walk a chain looking for a live entry with `key`.
    fn search_chain(&mut self, start: OverflowRef, key: u64) -> Result<Option<Location>> {
        let mut current = start;
        while current.is_some() {
            let entry = self.overflow_entry(current)?;
            if !entry.deleted && entry.key == key {
                return Ok(Some(Location::Overflow(current)));
            }
            current = entry.overflow;
        }
        Ok(None)
    }

    /// Read the entry at a location.
    fn entry_at(&mut self, location: Location) -> Result<PageEntry> {
        match location {
            Location::Main { page, slot } => {
                let handle = self.main_area.page(page)?;
                let entry = handle.read().entries[slot];
                Ok(entry)
            }
            Location::Overflow(at) => self.overflow_entry(at),
        }
    }

    /// Mutate the entry at a location in place.
    fn modify_entry<F>(&mut self, location: Location, apply: F) -> Result<()>
    where
        F: FnOnce(&mut PageEntry),
    {
        match location {
            Location::Main { page, slot } => {
                let handle = self.main_area.page(page)?;
                apply(&mut handle.write().entries[slot]);
                Ok(())
            }
            Location::Overflow(at) => self.with_overflow_entry(at, apply),
        }
    }

    /// Read one overflow entry by its flat reference.
    pub(super) fn overflow_entry(&mut self, at: OverflowRef) -> Result<PageEntry> {
        let handle = self.overflow_area.page(at.page())?;
        let entry = handle.read().entries[at.slot()];
        Ok(entry)
    }

    /// Mutate one overflow entry by its flat reference.
    fn with_overflow_entry<F>(&mut self, at: OverflowRef, apply: F) -> Result<()>
    where
        F: FnOnce(&mut PageEntry),
    {
        let handle = self.overflow_area.page(at.page())?;
        apply(&mut handle.write().entries[at.slot()]);
        Ok(())
    }

    // =========================================================================
    // Insert Internals
    // =========================================================================

    /// One insert attempt. `Ok(false)` means the overflow area had no free
    /// slot and the caller should reorganise and retry.
    fn try_insert(&mut self, key: u64, value: u64) -> Result<bool> {
        let Some(page_index) = self.find_index_position(key)? else {
            // Below every indexed range: the key joins the Guardian's chain.
            let Some(new_ref) = self.allocate_overflow_entry(key, value)? else {
                return Ok(false);
            };
            if self.guardian.is_none() {
                self.guardian = new_ref;
            } else {
                self.guardian = self.link_chain_entry(self.guardian, new_ref)?;
            }
            return Ok(true);
        };

        let handle = self.main_area.page(page_index)?;

        // The very first insert claims the index root sentinel, so smaller
        // keys route to the Guardian from here on.
        if page_index == 0 && handle.read().is_empty() {
            let root = self.index_area.page(0)?;
            root.write().entries[0] = IndexEntry::new(key, 0);
        }

        let placement = {
            let page = handle.read();
            let occupied = page.occupied();
            match occupied.last() {
                None => Placement::Append,
                Some(last) if last.key <= key => {
                    if page.is_full() {
                        Placement::Chain {
                            anchor: occupied.len() - 1,
                        }
                    } else {
                        Placement::Append
                    }
                }
                Some(_) => {
                    // Link from the entry immediately preceding the key.
                    match occupied.iter().position(|entry| entry.key > key) {
                        Some(0) | None => {
                            return Err(StrataError::Corruption(format!(
                                "main page {page_index} cannot own key {key}"
                            )))
                        }
                        Some(at) => Placement::Chain { anchor: at - 1 },
                    }
                }
            }
        };

        let anchor = match placement {
            Placement::Append => {
                handle.write().push(PageEntry::new(key, value));
                return Ok(true);
            }
            Placement::Chain { anchor } => anchor,
        };

        // Out of place: allocate in the overflow area and hang the entry
        // off the anchor's chain.
        let chain_head = handle.read().entries[anchor].overflow;
        drop(handle);

        let Some(new_ref) = self.allocate_overflow_entry(key, value)? else {
            return Ok(false);
        };

        let new_head = if chain_head.is_none() {
            new_ref
        } else {
            self.link_chain_entry(chain_head, new_ref)?
        };

        let handle = self.main_area.page(page_index)?;
        handle.write().entries[anchor].overflow = new_head;
        Ok(true)
    }

    /// Claim the first free slot across the overflow pages for a fresh
    /// entry. `None` when every page is full.
    fn allocate_overflow_entry(&mut self, key: u64, value: u64) -> Result<Option<OverflowRef>> {
        let pages = self.overflow_area.number_of_pages();
        for page_index in 0..pages {
            let handle = self.overflow_area.page(page_index)?;
            if handle.read().is_full() {
                continue;
            }
            let slot = handle.write().push(PageEntry::new(key, value));
            return Ok(Some(OverflowRef::from_parts(page_index, slot)));
        }
        Ok(None)
    }

    /// Splice `new_ref` into the chain starting at `head`, keeping it
    /// sorted ascending by key. Returns the (possibly new) chain head.
    fn link_chain_entry(&mut self, head: OverflowRef, new_ref: OverflowRef) -> Result<OverflowRef> {
        let new_key = self.overflow_entry(new_ref)?.key;

        let mut prev = OverflowRef::NONE;
        let mut current = head;
        while current.is_some() {
            let entry = self.overflow_entry(current)?;

            if entry.key > new_key {
                // Sorted position found: splice in before `current`.
                self.with_overflow_entry(new_ref, |e| e.overflow = current)?;
                if prev.is_none() {
                    return Ok(new_ref);
                }
                self.with_overflow_entry(prev, |e| e.overflow = new_ref)?;
                return Ok(head);
            }

            if entry.overflow.is_none() {
                // Reached the tail: append.
                self.with_overflow_entry(current, |e| e.overflow = new_ref)?;
                return Ok(head);
            }

            prev = current;
            current = entry.overflow;
        }

        // Empty chain: the new entry is the whole chain.
        Ok(new_ref)
    }

    /// Occupied fraction of the overflow area (tombstones included — they
    /// hold slots until reorganisation).
    fn overflow_fill(&mut self) -> Result<f64> {
        let pages = self.overflow_area.number_of_pages();
        if pages == 0 {
            return Ok(1.0);
        }

        let mut occupied = 0u64;
        for page_index in 0..pages {
            let handle = self.overflow_area.page(page_index)?;
            occupied += handle.read().number_of_entries;
        }
        Ok(occupied as f64 / (pages * PAGE_SIZE as u64) as f64)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // The caches flush themselves when dropped; the Guardian just has
        // to be in the header by then.
        self.main_area.header_mut().overflow_head = self.guardian;
    }
}
