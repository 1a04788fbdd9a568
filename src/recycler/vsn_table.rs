//! The VSN interning table.

use std::collections::HashMap;

use rmc_api_types::{vsn_label_is_legal, MediaClass};

use crate::{Error, Result};

/// One interned (media type, VSN) pair with its accumulated usage.
#[derive(Clone, Debug, Default)]
pub struct VsnTableEntry {
    pub media_type: String,
    pub vsn: String,
    /// Bytes of live archive data seen on this volume
    pub size: u64,
    /// Archive copies (files) seen on this volume
    pub count: u64,
    /// Volume was seen in a robot catalog during this pass
    pub in_robot: bool,
    pub library_eq: Option<u16>,
    pub slot: Option<u32>,
}

impl VsnTableEntry {
    /// Account one archive copy of `size` bytes.
    pub fn add_usage(&mut self, size: u64) {
        self.size += size;
        self.count += 1;
    }
}

/// Interning table over (media type, VSN) pairs.
///
/// The backing array preserves insertion order and is the authority
/// for "how many distinct VSNs were seen" and "in what order"; the
/// hash index is only the lookup accelerator. The table grows
/// monotonically - there is no removal, a new scan pass starts from an
/// empty table.
#[derive(Default)]
pub struct VsnTable {
    entries: Vec<VsnTableEntry>,
    index: HashMap<(String, String), usize>,
}

impl VsnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct VSNs interned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up or intern a (media type, VSN) pair.
    ///
    /// The VSN is validated against the label rules of the media class
    /// BEFORE any lookup; an invalid VSN is rejected without touching
    /// the table.
    pub fn find_or_insert(&mut self, media_type: &str, vsn: &str) -> Result<&mut VsnTableEntry> {
        let class = MediaClass::from_media_type(media_type);
        if !vsn_label_is_legal(class, vsn) {
            return Err(Error::InvalidVsn {
                media_type: media_type.to_string(),
                vsn: vsn.to_string(),
            });
        }

        let key = (media_type.to_string(), vsn.to_string());

        let index = match self.index.get(&key) {
            Some(&index) => index,
            None => {
                let index = self.entries.len();
                self.entries.push(VsnTableEntry {
                    media_type: media_type.to_string(),
                    vsn: vsn.to_string(),
                    ..Default::default()
                });
                self.index.insert(key, index);
                index
            }
        };

        Ok(&mut self.entries[index])
    }

    /// Look up an interned pair without creating it.
    pub fn find(&self, media_type: &str, vsn: &str) -> Option<&VsnTableEntry> {
        let key = (media_type.to_string(), vsn.to_string());
        self.index.get(&key).map(|&index| &self.entries[index])
    }

    /// The interned entries in insertion order.
    pub fn entries(&self) -> &[VsnTableEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn find_or_insert_is_idempotent() -> Result<()> {
        let mut table = VsnTable::new();

        table.find_or_insert("li", "VOL001")?.add_usage(1000);
        assert_eq!(table.len(), 1);

        // second call returns the same accumulation entry
        let entry = table.find_or_insert("li", "VOL001")?;
        entry.add_usage(500);
        assert_eq!(table.len(), 1);

        let entry = table.find("li", "VOL001").unwrap();
        assert_eq!(entry.size, 1500);
        assert_eq!(entry.count, 2);
        Ok(())
    }

    #[test]
    fn media_type_is_part_of_the_key() -> Result<()> {
        let mut table = VsnTable::new();

        table.find_or_insert("li", "VOL001")?;
        table.find_or_insert("ti", "VOL001")?;
        assert_eq!(table.len(), 2);
        Ok(())
    }

    #[test]
    fn invalid_vsn_rejected_without_mutation() {
        let mut table = VsnTable::new();
        table.find_or_insert("li", "VOL001").unwrap();

        // lower case is illegal on ANSI labeled tape
        match table.find_or_insert("li", "vol002") {
            Err(Error::InvalidVsn { media_type, vsn }) => {
                assert_eq!(media_type, "li");
                assert_eq!(vsn, "vol002");
            }
            other => panic!("expected InvalidVsn, got {:?}", other.map(|_| ())),
        }

        // table unchanged
        assert_eq!(table.len(), 1);
        assert!(table.find("li", "vol002").is_none());

        // the same string is a legal generic label for disk media
        table.find_or_insert("dk", "vol002").unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn insertion_order_is_preserved() -> Result<()> {
        let mut table = VsnTable::new();

        for vsn in ["CC3", "AA1", "BB2"] {
            table.find_or_insert("li", vsn)?;
        }
        // re-interning must not reorder
        table.find_or_insert("li", "AA1")?;

        let order: Vec<&str> = table.entries().iter().map(|e| e.vsn.as_str()).collect();
        assert_eq!(order, vec!["CC3", "AA1", "BB2"]);
        Ok(())
    }

    #[test]
    fn grows_past_any_fixed_batch() -> Result<()> {
        let mut table = VsnTable::new();

        for i in 0..5000 {
            table.find_or_insert("li", &format!("V{:05}", i))?;
        }
        assert_eq!(table.len(), 5000);
        assert_eq!(table.entries()[4999].vsn, "V04999");
        Ok(())
    }
}
