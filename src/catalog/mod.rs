//! Volume catalog registry.
//!
//! The registry is an explicit handle over the per-library catalogs
//! plus the configured VSN pools and maps; it is passed into queries
//! instead of living in shared process state. Catalog files are JSON
//! snapshots, one per library.

use std::path::Path;

use serde::{Deserialize, Serialize};

use rmc_api_types::{CatalogEntry, CatalogStatus, Reservation, VsnMap, VsnPool};

use crate::{Error, Result};

mod query;
pub use query::*;

mod restrict;
pub use restrict::*;

/// The catalog of one library (or standalone drive).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LibraryCatalog {
    /// Equipment number of the library
    pub eq: u16,
    /// Family set name
    pub name: String,
    pub entries: Vec<CatalogEntry>,
}

impl LibraryCatalog {
    /// Read a catalog snapshot. A failure to read or decode the file
    /// means the catalog source is unavailable, not that it is empty.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read(path).map_err(|err| {
            Error::CatalogUnavailable(format!("cannot read {:?} - {}", path, err))
        })?;

        serde_json::from_slice(&content).map_err(|err| {
            Error::CatalogUnavailable(format!("cannot decode {:?} - {}", path, err))
        })
    }

    /// Write a catalog snapshot.
    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        let data = serde_json::to_vec_pretty(self).map_err(|err| {
            Error::CatalogUnavailable(format!("cannot encode catalog - {}", err))
        })?;

        std::fs::write(path, data).map_err(|err| {
            Error::CatalogUnavailable(format!("cannot write {:?} - {}", path, err))
        })
    }
}

/// Registry over all catalogs, pools and maps of one configuration.
#[derive(Default)]
pub struct CatalogRegistry {
    catalogs: Vec<LibraryCatalog>,
    pools: Vec<VsnPool>,
    maps: Vec<VsnMap>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a library catalog. Equipment numbers are unique.
    pub fn add_catalog(&mut self, catalog: LibraryCatalog) -> Result<()> {
        if self.catalogs.iter().any(|c| c.eq == catalog.eq) {
            return Err(Error::DuplicateKey(catalog.eq.to_string()));
        }
        self.catalogs.push(catalog);
        Ok(())
    }

    /// Register a named VSN pool.
    pub fn add_pool(&mut self, pool: VsnPool) -> Result<()> {
        if self.pools.iter().any(|p| p.name == pool.name) {
            return Err(Error::DuplicateKey(pool.name));
        }
        self.pools.push(pool);
        Ok(())
    }

    /// Register a VSN map.
    pub fn add_map(&mut self, map: VsnMap) -> Result<()> {
        if self.maps.iter().any(|m| m.name == map.name) {
            return Err(Error::DuplicateKey(map.name));
        }
        self.maps.push(map);
        Ok(())
    }

    pub fn pool(&self, name: &str) -> Option<&VsnPool> {
        self.pools.iter().find(|p| p.name == name)
    }

    pub fn map(&self, name: &str) -> Option<&VsnMap> {
        self.maps.iter().find(|m| m.name == name)
    }

    pub(crate) fn catalog(&self, eq: u16) -> Result<&LibraryCatalog> {
        self.catalogs
            .iter()
            .find(|c| c.eq == eq)
            .ok_or_else(|| Error::NotFound(format!("no catalog for library {}", eq)))
    }

    fn catalog_mut(&mut self, eq: u16) -> Result<&mut LibraryCatalog> {
        self.catalogs
            .iter_mut()
            .find(|c| c.eq == eq)
            .ok_or_else(|| Error::NotFound(format!("no catalog for library {}", eq)))
    }

    /// All in-use entries across every catalog, in scan order.
    pub fn all_entries(&self) -> Vec<CatalogEntry> {
        self.catalogs
            .iter()
            .flat_map(|c| c.entries.iter())
            .filter(|ce| ce.status.contains(CatalogStatus::IN_USE))
            .cloned()
            .collect()
    }

    /// Entry at a specific slot address.
    pub fn entry_at(&self, eq: u16, slot: u32, partition: i32) -> Result<&CatalogEntry> {
        self.catalog(eq)?
            .entries
            .iter()
            .find(|ce| ce.slot == slot && ce.partition == partition)
            .ok_or_else(|| {
                Error::NotFound(format!("no entry at {}:{}:{}", eq, slot, partition))
            })
    }

    /// All entries holding a volume with this VSN (duplicate VSNs can
    /// exist across libraries).
    pub fn entries_by_vsn(&self, vsn: &str) -> Vec<CatalogEntry> {
        self.catalogs
            .iter()
            .flat_map(|c| c.entries.iter())
            .filter(|ce| ce.vsn == vsn)
            .cloned()
            .collect()
    }

    /// Number of entries in one library's catalog.
    pub fn entry_count(&self, eq: u16) -> Result<usize> {
        Ok(self.catalog(eq)?.entries.len())
    }

    /// Total capacity of a library, summed over its catalog.
    pub fn library_capacity(&self, eq: u16) -> Result<u64> {
        Ok(self.catalog(eq)?.entries.iter().map(|ce| ce.capacity).sum())
    }

    /// Total free space of a library, summed over its catalog.
    pub fn library_free_space(&self, eq: u16) -> Result<u64> {
        Ok(self.catalog(eq)?.entries.iter().map(|ce| ce.space).sum())
    }

    /// Attach an advisory reservation to a catalog slot. A zero
    /// reservation time is filled with the current time.
    pub fn reserve(
        &mut self,
        eq: u16,
        slot: u32,
        partition: i32,
        mut reservation: Reservation,
    ) -> Result<()> {
        if reservation.time == 0 {
            reservation.time = proxmox_time::epoch_i64();
        }

        let catalog = self.catalog_mut(eq)?;

        let entry = catalog
            .entries
            .iter_mut()
            .find(|ce| ce.slot == slot && ce.partition == partition)
            .ok_or_else(|| {
                Error::NotFound(format!("no entry at {}:{}:{}", eq, slot, partition))
            })?;

        if let Some(existing) = &entry.reservation {
            return Err(Error::InvalidParameter(format!(
                "volume {} already reserved by {}/{}/{}",
                entry.vsn, existing.archive_set, existing.owner, existing.filesystem
            )));
        }

        entry.reservation = Some(reservation);
        Ok(())
    }

    /// Detach the reservation of a catalog slot. Unreserving a slot
    /// without a reservation is a no-op.
    pub fn unreserve(&mut self, eq: u16, slot: u32, partition: i32) -> Result<()> {
        let catalog = self.catalog_mut(eq)?;

        let entry = catalog
            .entries
            .iter_mut()
            .find(|ce| ce.slot == slot && ce.partition == partition)
            .ok_or_else(|| {
                Error::NotFound(format!("no entry at {}:{}:{}", eq, slot, partition))
            })?;

        entry.reservation = None;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testlib {
    use super::*;

    pub fn entry(eq: u16, slot: u32, vsn: &str, media: &str, capacity: u64, space: u64) -> CatalogEntry {
        CatalogEntry {
            vsn: vsn.to_string(),
            media_type: media.to_string(),
            slot,
            partition: -1,
            status: CatalogStatus::IN_USE | CatalogStatus::LABELED,
            capacity,
            space,
            block_size: 262144,
            library_eq: eq,
            ..Default::default()
        }
    }

    pub fn registry_with_catalog(eq: u16, entries: Vec<CatalogEntry>) -> CatalogRegistry {
        let mut registry = CatalogRegistry::new();
        registry
            .add_catalog(LibraryCatalog {
                eq,
                name: format!("lib{}", eq),
                entries,
            })
            .unwrap();
        registry
    }
}
