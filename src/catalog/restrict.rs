//! Restriction strings for volume listings.
//!
//! Callers narrow a volume listing with a comma separated
//! `key = value` string, e.g. `volname=VOL001, mtype=li` or
//! `startslot=0, endslot=199`. Only entries whose slot is in use are
//! ever compared.

use rmc_api_types::{CatalogEntry, CatalogStatus};

use crate::{Error, Result};

use super::CatalogRegistry;

/// Parsed volume listing restrictions. Absent keys do not restrict.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VolumeRestrictions {
    pub volname: Option<String>,
    pub mtype: Option<String>,
    pub startslot: Option<u32>,
    pub endslot: Option<u32>,
    pub partition: Option<i32>,
}

impl VolumeRestrictions {
    /// Parse a restriction string. An unknown key or an unparseable
    /// value is an error - a silently ignored restriction would return
    /// volumes the caller asked to exclude.
    pub fn parse(restrictions: &str) -> Result<Self> {
        let mut parsed = VolumeRestrictions::default();

        for token in restrictions.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            let (key, value) = token.split_once('=').ok_or_else(|| {
                Error::InvalidParameter(format!("expected key=value, got '{}'", token))
            })?;
            let (key, value) = (key.trim(), value.trim());

            let parse_num = |what: &str, value: &str| -> Result<i64> {
                value.parse().map_err(|_| {
                    Error::InvalidParameter(format!("bad value '{}' for '{}'", value, what))
                })
            };

            match key {
                "volname" => parsed.volname = Some(value.to_string()),
                "mtype" => parsed.mtype = Some(value.to_string()),
                "startslot" => parsed.startslot = Some(parse_num(key, value)? as u32),
                "endslot" => parsed.endslot = Some(parse_num(key, value)? as u32),
                "partition" => parsed.partition = Some(parse_num(key, value)? as i32),
                _ => {
                    return Err(Error::InvalidParameter(format!(
                        "unknown restriction '{}'",
                        key
                    )))
                }
            }
        }

        Ok(parsed)
    }

    /// True when a catalog entry passes every active restriction.
    pub fn matches(&self, ce: &CatalogEntry) -> bool {
        // the library slot has to be in use for any comparison to be
        // valid
        if !ce.status.contains(CatalogStatus::IN_USE) {
            return false;
        }

        if let Some(volname) = &self.volname {
            if ce.vsn != *volname {
                return false;
            }
        }
        if let Some(mtype) = &self.mtype {
            if ce.media_type != *mtype {
                return false;
            }
        }
        if let Some(startslot) = self.startslot {
            if ce.slot < startslot {
                return false;
            }
        }
        if let Some(endslot) = self.endslot {
            if ce.slot > endslot {
                return false;
            }
        }
        if let Some(partition) = self.partition {
            if ce.partition != partition {
                return false;
            }
        }

        true
    }
}

impl CatalogRegistry {
    /// List volumes, optionally restricted to one library and by a
    /// restriction string.
    pub fn list_volumes(
        &self,
        lib_eq: Option<u16>,
        restrictions: Option<&str>,
    ) -> Result<Vec<CatalogEntry>> {
        let filter = match restrictions {
            Some(restrictions) => VolumeRestrictions::parse(restrictions)?,
            None => VolumeRestrictions::default(),
        };

        let entries = match lib_eq {
            Some(eq) => self.catalog(eq)?.entries.clone(),
            None => self
                .catalogs
                .iter()
                .flat_map(|c| c.entries.iter())
                .cloned()
                .collect(),
        };

        Ok(entries.into_iter().filter(|ce| filter.matches(ce)).collect())
    }
}
