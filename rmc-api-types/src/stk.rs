//! StorageTek ACSLS parameter and record types.

use serde::{Deserialize, Serialize};

/// Cartridge Access Port coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StkCap {
    pub acs: i32,
    pub lsm: i32,
    pub cap: i32,
}

/// Capacity override: index into the ACSLS media_type file -> capacity
/// in units of 1024 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StkCapacity {
    pub index: i32,
    pub value: u64,
}

/// One local device path mapped to its ACS drive coordinates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StkDevice {
    /// Path to the device on the client
    pub path: String,
    pub acs: i32,
    pub lsm: i32,
    pub panel: i32,
    pub drive: i32,
    /// Drive is shared with other hosts
    pub shared: bool,
}

/// Parsed StorageTek parameter file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StkParam {
    /// Hostname of the server running ACSLS
    pub hostname: String,
    /// User id used by the client for access control
    pub access: String,
    /// Port number for SSI services on the ACSLS server
    pub portnum: i32,
    /// Hostname of the multihomed client host facing the ACSLS lan
    pub ssi_host: String,
    /// Port for incoming responses from the ACSLS server (-1 = unset)
    pub ssi_inet_portnum: i32,
    /// Port the SSI sends requests to on the ACSLS server (-1 = unset)
    pub csi_hostport: i32,
    pub cap: StkCap,
    pub capacity_list: Vec<StkCapacity>,
    pub device_list: Vec<StkDevice>,
}

/// Connection state for one ACSLS server, environment for the SSI.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StkHostInfo {
    pub hostname: String,
    pub portnum: String,
    pub access: String,
    pub ssi_host: String,
    pub ssi_inet_portnum: String,
    pub csi_hostport: String,
}

impl From<&StkParam> for StkHostInfo {
    fn from(param: &StkParam) -> Self {
        let fmt_port = |p: i32| if p > 0 { p.to_string() } else { String::new() };
        StkHostInfo {
            hostname: param.hostname.clone(),
            portnum: fmt_port(param.portnum),
            access: param.access.clone(),
            ssi_host: param.ssi_host.clone(),
            ssi_inet_portnum: fmt_port(param.ssi_inet_portnum),
            csi_hostport: fmt_port(param.csi_hostport),
        }
    }
}

/// One volume row from an ACSLS `display volume` response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StkVolume {
    pub vsn: String,
    pub acs: i32,
    pub lsm: i32,
    pub panel: i32,
    pub row: i32,
    pub column: i32,
    pub pool_id: i32,
    pub status: String,
    /// StorageTek media type string, e.g. `LTO-400G`
    pub media_type: String,
    pub volume_type: String,
}

/// One drive row from an ACSLS `display drive` response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AcsDrive {
    pub acs: String,
    pub lsm: String,
    pub panel: String,
    pub drive: String,
    pub status: String,
    pub state: String,
    /// Loaded volume, empty if the drive is free
    pub volume: String,
    pub drive_type: String,
    pub lock: i32,
    pub serial_num: String,
    pub condition: String,
}

/// One LSM row from an ACSLS `display lsm` response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AcsLsm {
    pub acs: String,
    pub lsm: String,
    pub serial_num: String,
    pub status: String,
    pub state: String,
    pub free_cells: i32,
}

/// One CAP row from an ACSLS `display cap` response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AcsCap {
    pub acs: i32,
    pub lsm: i32,
    pub cap: i32,
}

/// One scratch pool row from an ACSLS `display pool` response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StkPool {
    pub pool_id: i32,
    pub low_water_mark: i32,
    pub high_water_mark: i32,
    pub overflow: String,
}

/// Base parameter block shared by the Sony, IBM 3494 and ADIC/GRAU
/// network attached library dialects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NwLibParam {
    /// Library server hostname (`server` key, `name` for IBM 3494)
    pub server: String,
    pub drives: Vec<NwDrive>,
}

/// One drive entry from a network attached library parameter file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NwDrive {
    pub path: String,
    pub shared: bool,
}
