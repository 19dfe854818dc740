//! Diagnostic output
//!
//! Full three-area listing and the disk I/O counter surface.

use std::io::Write;

use crate::cache::{DiskHeader, PageCache};
use crate::error::Result;
use crate::page::DataPage;
use crate::stats::DiskStats;

use super::database::Database;

const RULE: &str = "================================================";

impl Database {
    /// Write a complete listing of the three areas to `out`.
    pub fn dump(&mut self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "{RULE}")?;
        writeln!(out, "Index area")?;
        writeln!(out, "{RULE}")?;

        for page_index in 0..self.index_area.number_of_pages() {
            let handle = self.index_area.page(page_index)?;
            let page = *handle.read();
            drop(handle);

            writeln!(
                out,
                "Page {} number of entries: {}",
                page_index, page.number_of_entries
            )?;
            for (slot, entry) in page.occupied().iter().enumerate() {
                writeln!(out, "\tEntry {slot}")?;
                writeln!(out, "\t\tstart_key: {}", entry.start_key)?;
                writeln!(out, "\t\tpage_index: {}", entry.page_index)?;
            }
        }

        writeln!(out, "{RULE}")?;
        writeln!(out, "Main area")?;
        writeln!(out, "{RULE}")?;
        writeln!(out, "Guardian overflow entry: {}", self.guardian)?;
        writeln!(out)?;
        dump_data_pages(&mut self.main_area, out)?;

        writeln!(out, "{RULE}")?;
        writeln!(out, "Overflow area")?;
        writeln!(out, "{RULE}")?;
        dump_data_pages(&mut self.overflow_area, out)?;

        Ok(())
    }

    /// Disk I/O counters across the three areas.
    pub fn stats(&self) -> DiskStats {
        DiskStats {
            index: self.index_area.stats(),
            main: self.main_area.stats(),
            overflow: self.overflow_area.stats(),
        }
    }

    /// Zero all disk I/O counters.
    pub fn reset_stats(&mut self) {
        self.index_area.reset_stats();
        self.main_area.reset_stats();
        self.overflow_area.reset_stats();
    }
}

fn dump_data_pages<H: DiskHeader>(
    area: &mut PageCache<DataPage, H>,
    out: &mut dyn Write,
) -> Result<()> {
    for page_index in 0..area.number_of_pages() {
        let handle = area.page(page_index)?;
        let page = *handle.read();
        drop(handle);

        writeln!(
            out,
            "Page {} number of entries: {}",
            page_index, page.number_of_entries
        )?;
        for (slot, entry) in page.occupied().iter().enumerate() {
            writeln!(out, "\tEntry {slot}")?;
            writeln!(out, "\t\tkey: {}", entry.key)?;
            writeln!(out, "\t\tvalue: {}", entry.value)?;
            writeln!(out, "\t\toverflow_entry: {}", entry.overflow)?;
            if entry.deleted {
                writeln!(out, "\t\tdeleted: true")?;
            }
        }
    }
    Ok(())
}
