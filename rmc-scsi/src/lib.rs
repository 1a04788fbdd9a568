//! SCSI passthrough support for removable media discovery.
//!
//! Wraps libsgutils2 to issue raw INQUIRY and READ ELEMENT STATUS
//! commands against Linux sg device nodes, and decodes the responses
//! into the identification records the discovery layer works with.

use serde::{Deserialize, Serialize};

pub mod sgutils2;

mod devid;
pub use devid::*;

mod element_status;
pub use element_status::*;

mod list_devices;
pub use list_devices::*;

/// SCSI peripheral device type of a medium changer (robot).
pub const PERIPHERAL_TYPE_CHANGER: u8 = 8;
/// SCSI peripheral device type of a tape drive.
pub const PERIPHERAL_TYPE_TAPE: u8 = 1;

/// Device node kind as reported by the OS device directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Changer,
    Tape,
}

/// One enumerated OS device node, before any SCSI command was issued.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceNode {
    pub kind: DeviceKind,
    pub path: String,
}

/// Identity of a probed device, assembled from the standard INQUIRY
/// and the unit serial number page.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceIdentity {
    /// Peripheral device type (0-31)
    pub peripheral_type: u8,
    pub vendor: String,
    pub product: String,
    /// Firmware revision
    pub revision: String,
    /// Unit serial number (page 0x80)
    pub serial: String,
    /// Identification descriptors (page 0x83), may be empty
    pub device_ids: Vec<DeviceId>,
}

