//! Enumerate SCSI generic device nodes.

use std::path::PathBuf;

use crate::{DeviceKind, DeviceNode};

lazy_static::lazy_static! {
    static ref SCSI_GENERIC_NAME_REGEX: regex::Regex =
        regex::Regex::new(r"^sg\d+$").unwrap();
}

fn scan_scsi_generic(wanted_type: &str, kind: DeviceKind) -> Vec<DeviceNode> {
    let mut list = Vec::new();

    let dir_iter = match proxmox_sys::fs::scan_subdir(
        libc::AT_FDCWD,
        "/sys/class/scsi_generic",
        &SCSI_GENERIC_NAME_REGEX,
    ) {
        Err(_) => return list,
        Ok(iter) => iter,
    };

    for item in dir_iter {
        let item = match item {
            Err(_) => continue,
            Ok(item) => item,
        };

        let name = match item.file_name().to_str() {
            Ok(name) => name.to_string(),
            Err(_) => continue,
        };

        let mut sys_path = PathBuf::from("/sys/class/scsi_generic");
        sys_path.push(&name);

        let device = match udev::Device::from_syspath(&sys_path) {
            Err(_) => continue,
            Ok(device) => device,
        };

        let parent = match device.parent() {
            None => continue,
            Some(parent) => parent,
        };

        match parent.attribute_value("type") {
            Some(type_osstr) => {
                if type_osstr != wanted_type {
                    continue;
                }
            }
            _ => continue,
        }

        let dev_path = match device.devnode() {
            None => continue,
            Some(dev_path) => dev_path.to_string_lossy().to_string(),
        };

        list.push(DeviceNode {
            kind,
            path: dev_path,
        });
    }

    list
}

/// List medium changer device nodes (peripheral type 8).
///
/// Nodes are returned in directory enumeration order; a scan failure
/// yields an empty list.
pub fn list_changer_nodes() -> Vec<DeviceNode> {
    scan_scsi_generic("8", DeviceKind::Changer)
}

/// List tape drive device nodes (peripheral type 1).
pub fn list_tape_nodes() -> Vec<DeviceNode> {
    scan_scsi_generic("1", DeviceKind::Tape)
}
