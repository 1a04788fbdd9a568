//! Media and equipment type classification.
//!
//! Three stateless lookups: samfs id to device type, SCSI vendor and
//! product id to equipment type (via the `inquiry.conf` table), and
//! StorageTek media type strings to SAM media types with their nominal
//! capacities.

use std::path::Path;

use crate::{Error, Result};

use rmc_api_types::UNDEFINED_EQU_TYPE;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;
const TIB: u64 = 1024 * GIB;

/// Device type families. `Undefined` (numeric 99) is the valid resolved
/// state for devices discovery could not classify.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceType {
    /// Direct attached (SCSI) media changer
    Robot,
    /// StorageTek ACSLS network attached library
    StkApi,
    /// IBM 3494 network attached library
    IbmAtl,
    /// Sony PetaSite network attached library
    SonyPsc,
    /// ADIC/GRAU DAS network attached library
    GrauAci,
    Tape3480,
    Tape9490,
    Tape9840,
    Tape9940,
    TapeT10000,
    TapeD3,
    DltTape,
    LtoTape,
    SonyDtf,
    Ibm3570,
    Ibm3590,
    GenericTape,
    OpticalDisk,
    MagnetoOptical,
    WriteOnce,
    DiskArchive,
    Undefined,
}

// samfs id (2-3 character mnemonic) -> device type
static SAM_MODEL: &[(&str, DeviceType)] = &[
    ("rb", DeviceType::Robot),
    ("sk", DeviceType::StkApi),
    ("im", DeviceType::IbmAtl),
    ("pe", DeviceType::SonyPsc),
    ("gr", DeviceType::GrauAci),
    ("st", DeviceType::Tape3480),
    ("se", DeviceType::Tape9490),
    ("sg", DeviceType::Tape9840),
    ("sf", DeviceType::Tape9940),
    ("ti", DeviceType::TapeT10000),
    ("d3", DeviceType::TapeD3),
    ("lt", DeviceType::DltTape),
    ("li", DeviceType::LtoTape),
    ("so", DeviceType::SonyDtf),
    ("i7", DeviceType::Ibm3570),
    ("ib", DeviceType::Ibm3590),
    ("tp", DeviceType::GenericTape),
    ("od", DeviceType::OpticalDisk),
    ("mo", DeviceType::MagnetoOptical),
    ("wo", DeviceType::WriteOnce),
    ("dk", DeviceType::DiskArchive),
];

/// Resolve a samfs id to its device type.
///
/// Never fails - an unknown id resolves to [`DeviceType::Undefined`],
/// which is a valid state for the caller, not an error.
pub fn samid_to_device_type(samid: &str) -> DeviceType {
    for (name, device_type) in SAM_MODEL {
        if *name == samid {
            return *device_type;
        }
    }
    DeviceType::Undefined
}

/// One row of the `inquiry.conf` table.
#[derive(Clone, Debug)]
pub struct InquiryEntry {
    pub vendor: String,
    pub product: String,
    pub sam_id: String,
}

/// Resolve SCSI vendor/product ids to a two letter equipment type.
///
/// Vendor and product are compared as PREFIXES through the length of
/// the table strings, in table order, first match wins. This is the
/// documented `inquiry.conf` matching policy - a table should list
/// longer product names first. A miss yields the `"99"` sentinel.
pub fn equ_type_for_vendor_product(vendor: &str, product: &str, table: &[InquiryEntry]) -> String {
    for entry in table {
        if vendor.starts_with(&entry.vendor) && product.starts_with(&entry.product) {
            if samid_to_device_type(&entry.sam_id) == DeviceType::Undefined {
                return UNDEFINED_EQU_TYPE.to_string();
            }
            return entry.sam_id.clone();
        }
    }
    UNDEFINED_EQU_TYPE.to_string()
}

/// Read an `inquiry.conf` style table: one device per line, three
/// comma separated double quoted fields (vendor, product, samfs id).
/// Lines starting with `#` and blank lines are skipped; lines with
/// fewer than three quoted fields are skipped with a warning.
pub fn load_inquiry_conf<P: AsRef<Path>>(path: P) -> Result<Vec<InquiryEntry>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|err| Error::InvalidParameter(format!("cannot read {:?} - {}", path, err)))?;

    let mut table = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = Vec::new();
        for part in line.splitn(3, ',') {
            let part = part.trim();
            if let Some(inner) = part
                .strip_prefix('"')
                .and_then(|rest| rest.split('"').next())
            {
                fields.push(inner.to_string());
            }
        }

        if fields.len() != 3 {
            log::warn!("skipping malformed inquiry.conf line: {}", line);
            continue;
        }

        let mut fields = fields.into_iter();
        table.push(InquiryEntry {
            vendor: fields.next().unwrap(),
            product: fields.next().unwrap(),
            sam_id: fields.next().unwrap(),
        });
    }

    Ok(table)
}

struct AcslsMediaMap {
    stk_media: &'static str,
    sam_media: &'static str,
    capacity: u64,
    // legacy spellings are matched for backward compatibility but
    // never emitted
    legacy: bool,
}

const fn row(stk_media: &'static str, sam_media: &'static str, capacity: u64) -> AcslsMediaMap {
    AcslsMediaMap {
        stk_media,
        sam_media,
        capacity,
        legacy: false,
    }
}

const fn legacy_row(stk_media: &'static str, sam_media: &'static str, capacity: u64) -> AcslsMediaMap {
    AcslsMediaMap {
        stk_media,
        sam_media,
        capacity,
        legacy: true,
    }
}

// StorageTek media type string -> SAM media type and nominal capacity.
// Cleaning cartridges map with capacity 0.
static ACSLS_MAP: &[AcslsMediaMap] = &[
    row("3480", "st", 210 * MIB),
    row("3490E", "st", 800 * MIB),
    row("DD3A", "d3", 10 * GIB),
    row("DD3B", "d3", 25 * GIB),
    row("DD3C", "d3", 50 * GIB),
    row("DD3D", "d3", 0),
    row("DLTIII", "lt", 10 * GIB),
    row("DLTIV", "lt", 20 * GIB),
    row("DLTIIIXT", "lt", 15 * GIB),
    row("STK1R", "sg", 20 * GIB),
    row("STK1U", "sg", 0),
    row("STK1Y", "sg", 800 * GIB),
    row("EECART", "se", 1638 * MIB),
    row("STK2P", "sf", 60 * GIB),
    row("STK2W", "sf", 0),
    row("LTO-10G", "li", 10 * GIB),
    row("LTO-35G", "li", 35 * GIB),
    row("LTO-50G", "li", 50 * GIB),
    row("LTO-100G", "li", 100 * GIB),
    row("LTO-200G", "li", 200 * GIB),
    row("LTO-400G", "li", 400 * GIB),
    row("LTO-400W", "li", 400 * GIB),
    row("LTO-800G", "li", 800 * GIB),
    row("LTO-800W", "li", 800 * GIB),
    row("LTO-1.5T", "li", 1536 * GIB),
    row("LTO-1.5W", "li", 1536 * GIB),
    row("LTO-2.5T", "li", 2560 * GIB),
    row("LTO-2.5W", "li", 2560 * GIB),
    row("LTO-6.4T", "li", 6 * TIB),
    row("LTO-6.4W", "li", 6 * TIB),
    row("LTO-CLN1", "li", 0),
    row("LTO-CLN2", "li", 0),
    row("LTO-CLN3", "li", 0),
    row("LTO-CLNU", "li", 0),
    row("SDLT", "lt", 110 * GIB),
    row("SDLT-2", "lt", 312 * GIB),
    row("SDLT-4", "lt", 800 * GIB),
    row("SDLT-S1", "lt", 800 * GIB),
    row("SDLT-S2", "lt", 800 * GIB),
    row("SDLT-S3", "lt", 800 * GIB),
    row("SDLT-S4", "lt", 800 * GIB),
    row("T10000T1", "ti", 500 * GIB),
    row("T10000TS", "ti", 120 * GIB),
    row("T10000CT", "ti", 0),
    row("T10000T2", "ti", 1000 * GIB),
    row("T10000TT", "ti", 1000 * GIB),
    row("T10000CC", "ti", 0),
    row("T10000CL", "ti", 0),
    row("T10000TA", "ti", 5000 * GIB),
    legacy_row("STK1", "sg", 20 * GIB),
    legacy_row("T10000", "ti", 500 * GIB),
];

/// Map a StorageTek media type string to the SAM media type and its
/// nominal capacity in bytes.
///
/// Unlike device classification a miss here is a hard error - without
/// the mapping the cartridge cannot be accounted for.
pub fn stk_media_to_sam_media(stk_media: &str) -> Result<(&'static str, u64)> {
    for entry in ACSLS_MAP {
        if entry.stk_media == stk_media {
            return Ok((entry.sam_media, entry.capacity));
        }
    }
    Err(Error::MediaMapFailed(stk_media.to_string()))
}

/// First (non legacy) StorageTek media type string emitted for a SAM
/// media type.
pub fn stk_media_for_sam_media(sam_media: &str) -> Option<&'static str> {
    ACSLS_MAP
        .iter()
        .find(|entry| !entry.legacy && entry.sam_media == sam_media)
        .map(|entry| entry.stk_media)
}
