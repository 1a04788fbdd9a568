//! Catalog queries: sorting, pagination, pool and map resolution.
//!
//! This is the query surface consumed by the archiver and stager. Two
//! pagination models coexist: result-count windows (`start`, `size`
//! with -1 meaning "all remaining") and slot-number ranges, the latter
//! so a caller can page through a catalog too large for one response.

use rmc_api_types::{CatalogEntry, SortKey, VsnPool, VsnPoolProperty};

use crate::{Error, Result};

use super::CatalogRegistry;

/// Sort a catalog entry list and cut the `[start, start+size)` window
/// out of it (`size` -1 keeps all remaining entries).
///
/// The sort is stable: entries comparing equal keep their scan order,
/// so repeated queries paginate consistently while the catalog is
/// unchanged.
pub fn sort_catalog_list(
    entries: &mut Vec<CatalogEntry>,
    start: i64,
    size: i64,
    sort_key: SortKey,
    ascending: bool,
) -> Result<()> {
    if start < 0 {
        return Err(Error::InvalidParameter(format!(
            "negative pagination start {}",
            start
        )));
    }
    if size < -1 {
        return Err(Error::InvalidParameter(format!(
            "bad pagination size {}",
            size
        )));
    }

    match sort_key {
        SortKey::None => (),
        SortKey::Vsn => entries.sort_by(|a, b| a.vsn.cmp(&b.vsn)),
        SortKey::Capacity => entries.sort_by(|a, b| a.capacity.cmp(&b.capacity)),
        SortKey::FreeSpace => entries.sort_by(|a, b| a.space.cmp(&b.space)),
        SortKey::Slot => entries.sort_by(|a, b| a.slot.cmp(&b.slot)),
        SortKey::MountTime => entries.sort_by(|a, b| a.mount_time.cmp(&b.mount_time)),
    }

    if !ascending && sort_key != SortKey::None {
        entries.reverse();
    }

    let start = start as usize;
    if start >= entries.len() {
        entries.clear();
        return Ok(());
    }
    entries.drain(..start);

    if size >= 0 {
        entries.truncate(size as usize);
    }

    Ok(())
}

impl CatalogRegistry {
    /// All catalog entries of one library, sorted and paginated by
    /// result count.
    pub fn catalog_entries(
        &self,
        eq: u16,
        start: i64,
        size: i64,
        sort_key: SortKey,
        ascending: bool,
    ) -> Result<Vec<CatalogEntry>> {
        let mut entries = self.catalog(eq)?.entries.clone();
        sort_catalog_list(&mut entries, start, size, sort_key, ascending)?;
        Ok(entries)
    }

    /// All catalog entries of one library whose slot number falls into
    /// `[start_slot, end_slot]`.
    pub fn catalog_entries_in_slot_range(
        &self,
        eq: u16,
        start_slot: u32,
        end_slot: u32,
        sort_key: SortKey,
        ascending: bool,
    ) -> Result<Vec<CatalogEntry>> {
        if end_slot < start_slot {
            return Err(Error::InvalidParameter(format!(
                "bad slot range {}..{}",
                start_slot, end_slot
            )));
        }

        let mut entries: Vec<CatalogEntry> = self
            .catalog(eq)?
            .entries
            .iter()
            .filter(|ce| ce.slot >= start_slot && ce.slot <= end_slot)
            .cloned()
            .collect();

        sort_catalog_list(&mut entries, 0, -1, sort_key, ascending)?;
        Ok(entries)
    }

    /// Catalog entries whose VSN matches a regular expression, across
    /// all libraries.
    pub fn vsn_list(
        &self,
        vsn_expression: &str,
        start: i64,
        size: i64,
        sort_key: SortKey,
        ascending: bool,
    ) -> Result<Vec<CatalogEntry>> {
        let re = regex::Regex::new(vsn_expression).map_err(|err| {
            Error::InvalidParameter(format!(
                "bad VSN expression '{}' - {}",
                vsn_expression, err
            ))
        })?;

        let mut entries: Vec<CatalogEntry> = self
            .all_entries()
            .into_iter()
            .filter(|ce| re.is_match(&ce.vsn))
            .collect();

        sort_catalog_list(&mut entries, start, size, sort_key, ascending)?;
        Ok(entries)
    }

    // Resolve a list of VSN expressions against the remaining catalog
    // entries. Matched entries are taken (each entry joins at most one
    // expression result), so pools referencing overlapping expressions
    // do not produce duplicates.
    fn take_matching_entries(
        media_type: &str,
        expressions: &[String],
        remaining: &mut Vec<Option<CatalogEntry>>,
        matched: &mut Vec<CatalogEntry>,
    ) -> Result<()> {
        for expression in expressions {
            let re = regex::Regex::new(expression).map_err(|err| {
                Error::InvalidParameter(format!(
                    "bad VSN expression '{}' - {}",
                    expression, err
                ))
            })?;

            for slot in remaining.iter_mut() {
                let matches = match slot {
                    Some(ce) => ce.media_type == media_type && re.is_match(&ce.vsn),
                    None => false,
                };
                if matches {
                    matched.push(slot.take().unwrap());
                }
            }
        }
        Ok(())
    }

    // Pool/map membership plus the aggregate accounting over the FULL
    // membership; the entry list is sorted and paginated afterwards.
    fn resolve_members(
        &self,
        name: &str,
        media_type: &str,
        expressions: &[String],
        pool_names: &[String],
        start: i64,
        size: i64,
        sort_key: SortKey,
        ascending: bool,
    ) -> Result<VsnPoolProperty> {
        let mut remaining: Vec<Option<CatalogEntry>> =
            self.all_entries().into_iter().map(Some).collect();
        let mut members = Vec::new();

        Self::take_matching_entries(media_type, expressions, &mut remaining, &mut members)?;

        for pool_name in pool_names {
            match self.pool(pool_name) {
                Some(pool) => {
                    Self::take_matching_entries(
                        media_type,
                        &pool.vsn_expressions,
                        &mut remaining,
                        &mut members,
                    )?;
                }
                None => log::warn!("map '{}' references unknown pool '{}'", name, pool_name),
            }
        }

        let mut property = VsnPoolProperty {
            name: name.to_string(),
            media_type: media_type.to_string(),
            number_of_vsn: members.len() as u64,
            capacity: members.iter().map(|ce| ce.capacity).sum(),
            // reserved volumes are spoken for - their remaining space
            // is not free for new archive copies
            free_space: members
                .iter()
                .filter(|ce| ce.reservation.is_none())
                .map(|ce| ce.space)
                .sum(),
            entries: members,
        };

        sort_catalog_list(&mut property.entries, start, size, sort_key, ascending)?;

        Ok(property)
    }

    fn resolve_pool(
        &self,
        pool: &VsnPool,
        start: i64,
        size: i64,
        sort_key: SortKey,
        ascending: bool,
    ) -> Result<VsnPoolProperty> {
        self.resolve_members(
            &pool.name,
            &pool.media_type,
            &pool.vsn_expressions,
            &[],
            start,
            size,
            sort_key,
            ascending,
        )
    }

    /// Resolve a named VSN pool or map against the live catalog.
    pub fn vsn_pool_properties(
        &self,
        pool_or_map: &str,
        start: i64,
        size: i64,
        sort_key: SortKey,
        ascending: bool,
    ) -> Result<VsnPoolProperty> {
        if let Some(pool) = self.pool(pool_or_map) {
            return self.resolve_pool(pool, start, size, sort_key, ascending);
        }

        if let Some(map) = self.map(pool_or_map) {
            return self.resolve_members(
                &map.name,
                &map.media_type,
                &map.vsn_expressions,
                &map.pool_names,
                start,
                size,
                sort_key,
                ascending,
            );
        }

        Err(Error::NotFound(format!(
            "no VSN pool or map named '{}'",
            pool_or_map
        )))
    }

    /// The volumes of a pool the archiver may pick a destination from:
    /// usable entries with nonzero free space. With
    /// `exclude_reserved`, volumes reserved for another archive set
    /// are dropped as well.
    pub fn available_vsns(
        &self,
        pool_name: &str,
        start: i64,
        size: i64,
        sort_key: SortKey,
        ascending: bool,
        exclude_reserved: bool,
    ) -> Result<Vec<CatalogEntry>> {
        let property = self.vsn_pool_properties(pool_name, 0, -1, SortKey::None, true)?;

        let mut entries: Vec<CatalogEntry> = property
            .entries
            .into_iter()
            .filter(|ce| ce.space > 0 && ce.is_usable())
            .filter(|ce| !(exclude_reserved && ce.reservation.is_some()))
            .collect();

        sort_catalog_list(&mut entries, start, size, sort_key, ascending)?;
        Ok(entries)
    }
}
