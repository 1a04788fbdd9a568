//! Types for the volume catalog.

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Catalog entry status bits.
    pub struct CatalogStatus: u32 {
        const NEEDS_AUDIT   = 0x0000_0001;
        const IN_USE        = 0x0000_0002;
        const LABELED       = 0x0000_0004;
        const BAD_MEDIA     = 0x0000_0008;
        const OCCUPIED      = 0x0000_0010;
        const CLEANING      = 0x0000_0020;
        const BAR_CODE      = 0x0000_0040;
        const WRITE_PROTECT = 0x0000_0080;
        const READ_ONLY     = 0x0000_0100;
        const RECYCLE       = 0x0000_0200;
        const UNAVAILABLE   = 0x0000_0400;
        const EXPORT_SLOT   = 0x0000_0800;
        const ARCHIVER_FULL = 0x0000_1000;
        const NON_SAM       = 0x0000_2000;
        const DUPLICATE_VSN = 0x0000_4000;
        const PRIORITY      = 0x0000_8000;
    }
}

impl Default for CatalogStatus {
    fn default() -> Self {
        CatalogStatus::empty()
    }
}

impl Serialize for CatalogStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for CatalogStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        CatalogStatus::from_bits(bits)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid status bits 0x{:08x}", bits)))
    }
}

/// Advisory reservation attached to a catalog slot.
///
/// A reservation only marks intent (which archive set plans to write to
/// this volume); it does not lock the slot against access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Reservation {
    /// Time the reservation was made (unix epoch)
    pub time: i64,
    /// Archive set name
    pub archive_set: String,
    /// Owner
    pub owner: String,
    /// File system name
    pub filesystem: String,
}

/// One physical slot/volume in a library or standalone drive catalog.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogEntry {
    /// Volume serial number
    pub vsn: String,
    /// Two letter media type code
    pub media_type: String,
    /// Slot number inside the owning library
    pub slot: u32,
    /// Partition number (-1 for unpartitioned media)
    pub partition: i32,
    pub status: CatalogStatus,
    /// Capacity in bytes
    pub capacity: u64,
    /// Remaining free space in bytes
    pub space: u64,
    /// Tape block size in bytes
    pub block_size: u32,
    /// Label time stamp (unix epoch, 0 if never labeled)
    pub label_time: i64,
    /// Last modification time stamp
    pub modification_time: i64,
    /// Last mount time stamp
    pub mount_time: i64,
    /// Barcode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    /// Equipment number of the owning library
    pub library_eq: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation: Option<Reservation>,
}

impl CatalogStatus {
    /// Render the status as the fixed twelve character flag string
    /// used in catalog listings (`-il---b-----` style; a dash marks a
    /// clear flag).
    pub fn flag_string(&self) -> String {
        let mut s = String::with_capacity(12);
        s.push(if self.contains(Self::NEEDS_AUDIT) { 'A' } else { '-' });
        s.push(if self.contains(Self::IN_USE) { 'i' } else { '-' });
        s.push(if self.contains(Self::LABELED) {
            'l'
        } else if self.contains(Self::NON_SAM) {
            'N'
        } else {
            '-'
        });
        s.push(if self.contains(Self::BAD_MEDIA) { 'E' } else { '-' });
        s.push(if self.contains(Self::OCCUPIED) { 'o' } else { '-' });
        s.push(if self.contains(Self::CLEANING) {
            'C'
        } else if self.contains(Self::PRIORITY) {
            'p'
        } else {
            '-'
        });
        s.push(if self.contains(Self::BAR_CODE) { 'b' } else { '-' });
        s.push(if self.contains(Self::WRITE_PROTECT) { 'W' } else { '-' });
        s.push(if self.contains(Self::READ_ONLY) { 'R' } else { '-' });
        s.push(if self.contains(Self::RECYCLE) { 'c' } else { '-' });
        s.push(if self.contains(Self::DUPLICATE_VSN) {
            'd'
        } else if self.contains(Self::UNAVAILABLE) {
            'U'
        } else {
            '-'
        });
        s.push(if self.contains(Self::EXPORT_SLOT) {
            'X'
        } else if self.contains(Self::ARCHIVER_FULL) {
            'f'
        } else {
            '-'
        });
        s
    }
}

impl CatalogEntry {
    /// True if the entry may appear in "available VSN" query results.
    ///
    /// Unusable media (bad, unavailable, cleaning cartridges or foreign
    /// labels) is excluded no matter how much space it reports.
    pub fn is_usable(&self) -> bool {
        self.status.contains(CatalogStatus::IN_USE)
            && !self.status.intersects(
                CatalogStatus::BAD_MEDIA
                    | CatalogStatus::UNAVAILABLE
                    | CatalogStatus::CLEANING
                    | CatalogStatus::NON_SAM,
            )
    }
}

/// Volume address: library equipment number, slot and partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VolumeId {
    pub library_eq: u16,
    pub slot: u32,
    pub partition: i32,
}

impl std::fmt::Display for VolumeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.partition >= 0 {
            write!(f, "{}:{}:{}", self.library_eq, self.slot, self.partition)
        } else {
            write!(f, "{}:{}", self.library_eq, self.slot)
        }
    }
}

/// Sort key for catalog entry listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Keep scan order
    None,
    Vsn,
    Capacity,
    FreeSpace,
    Slot,
    MountTime,
}

impl Default for SortKey {
    fn default() -> Self {
        SortKey::None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_bits_serialize_as_raw_bits() {
        let status = CatalogStatus::IN_USE | CatalogStatus::LABELED;

        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json, serde_json::json!(0x06));

        let decoded: CatalogStatus = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, status);

        // bits outside the defined set are rejected
        assert!(serde_json::from_value::<CatalogStatus>(serde_json::json!(0x8000_0000u32)).is_err());
    }

    #[test]
    fn entry_round_trip() {
        let entry = CatalogEntry {
            vsn: "VOL001".to_string(),
            media_type: "li".to_string(),
            slot: 7,
            partition: -1,
            status: CatalogStatus::IN_USE | CatalogStatus::BAR_CODE,
            capacity: 400 * 1024 * 1024 * 1024,
            space: 1024,
            block_size: 262144,
            library_eq: 50,
            barcode: Some("VOL001L5".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_string(&entry).unwrap();
        let decoded: CatalogEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.vsn, entry.vsn);
        assert_eq!(decoded.status, entry.status);
        assert_eq!(decoded.capacity, entry.capacity);
        assert_eq!(decoded.barcode, entry.barcode);
        assert!(decoded.reservation.is_none());
    }

    #[test]
    fn flag_strings() {
        let status = CatalogStatus::IN_USE | CatalogStatus::LABELED | CatalogStatus::BAR_CODE;
        assert_eq!(status.flag_string(), "-il---b-----");

        let status = CatalogStatus::IN_USE | CatalogStatus::NON_SAM | CatalogStatus::UNAVAILABLE;
        assert_eq!(status.flag_string(), "-iN-------U-");

        assert_eq!(CatalogStatus::empty().flag_string(), "------------");
    }

    #[test]
    fn usability() {
        let mut entry = CatalogEntry {
            status: CatalogStatus::IN_USE | CatalogStatus::LABELED,
            ..Default::default()
        };
        assert!(entry.is_usable());

        entry.status |= CatalogStatus::BAD_MEDIA;
        assert!(!entry.is_usable());

        entry.status = CatalogStatus::IN_USE | CatalogStatus::CLEANING;
        assert!(!entry.is_usable());

        // not in use at all
        entry.status = CatalogStatus::LABELED;
        assert!(!entry.is_usable());
    }
}
