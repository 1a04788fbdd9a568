//! Recycler side volume accounting.
//!
//! While a recycle pass scans catalogs and archive images it interns
//! every distinct (media type, VSN) pair exactly once and accumulates
//! the byte and file counts that later decide which volumes fall below
//! the reclaim threshold. The table lives for one scan pass and is
//! rebuilt from scratch on the next.

mod vsn_table;
pub use vsn_table::*;

use rmc_api_types::CatalogEntry;

/// Counters of one catalog scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Entries interned (including already known VSNs)
    pub scanned: usize,
    /// Entries skipped because their VSN fails the label rules of the
    /// media class
    pub invalid_vsns: usize,
}

impl VsnTable {
    /// Intern every catalog entry of a scan.
    ///
    /// An entry with an illegal VSN is counted and skipped - a single
    /// corrupt catalog entry must not halt recycling.
    pub fn scan_catalog(&mut self, entries: &[CatalogEntry]) -> ScanStats {
        let mut stats = ScanStats::default();

        for ce in entries {
            match self.find_or_insert(&ce.media_type, &ce.vsn) {
                Ok(vsn) => {
                    vsn.in_robot = true;
                    vsn.library_eq = Some(ce.library_eq);
                    vsn.slot = Some(ce.slot);
                    stats.scanned += 1;
                }
                Err(err) => {
                    log::warn!("skipping catalog entry: {}", err);
                    stats.invalid_vsns += 1;
                }
            }
        }

        stats
    }
}
