//! Library and drive records produced by discovery.

use serde::{Deserialize, Serialize};

use crate::StkParam;

/// A removable media library device.
///
/// Multiple OS device nodes may refer to the same physical library; all
/// paths resolving to the same serial number are collected in
/// `alternate_paths` (first-seen path first).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Library {
    /// Primary device path (first sighting)
    pub path: String,
    /// Serial number - the deduplication key
    pub serial_no: String,
    pub vendor_id: String,
    pub product_id: String,
    /// Firmware revision
    pub firmware: String,
    /// Two letter equipment type, "99" when unclassified
    pub equ_type: String,
    /// Equipment ordinal, assigned when the library is added to the
    /// configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eq: Option<u16>,
    /// All device paths that resolved to `serial_no`, in first-seen order
    pub alternate_paths: Vec<String>,
    /// Drives owned by this library
    pub drives: Vec<Drive>,
    /// StorageTek parameter block for network attached libraries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stk_param: Option<StkParam>,
}

/// A standalone or library resident tape/optical drive.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Drive {
    /// Primary device path (first sighting)
    pub path: String,
    /// Serial number - the deduplication key
    pub serial_no: String,
    pub vendor_id: String,
    pub product_id: String,
    /// Two letter equipment type, "99" when unclassified
    pub equ_type: String,
    /// All device paths that resolved to `serial_no`, in first-seen order
    pub alternate_paths: Vec<String>,
    /// WWN style identifiers from the device identification page
    pub wwn_ids: Vec<String>,
    /// VSN currently loaded, empty unless the drive holds media
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_vsn: Option<String>,
    /// Drive is shared with other hosts (network attached libraries)
    pub shared: bool,
}
