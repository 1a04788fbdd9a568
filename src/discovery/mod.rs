//! Device discovery.
//!
//! Maps OS device nodes to normalized [`Library`] and [`Drive`]
//! records. Multiple nodes frequently lead to the same physical unit
//! (multipathing); records are deduplicated by unit serial number
//! through a grouping table, collecting every path that resolved to
//! one unit as its alternate paths.

use std::fs::File;
use std::path::Path;

use anyhow::format_err;

use rmc_api_types::{Drive, Library};
use rmc_scsi::sgutils2::scsi_identify;
use rmc_scsi::{
    read_drive_identifiers, DeviceIdentity, PERIPHERAL_TYPE_CHANGER, PERIPHERAL_TYPE_TAPE,
};
use rmc_tools::list_hash::ListHash;

use crate::mediatype::{equ_type_for_vendor_product, InquiryEntry};
use crate::{Error, Result};

/// Per-device probe surface.
///
/// The production implementation ([`SgProber`]) opens the node and
/// issues raw SCSI commands; tests substitute canned identities.
pub trait DeviceProber {
    /// Open a device node and assemble its identity (standard INQUIRY,
    /// unit serial number, identification descriptors).
    fn identify(&mut self, path: &str) -> anyhow::Result<DeviceIdentity>;

    /// Serial numbers of the data transfer elements of a changer.
    fn drive_serials(&mut self, path: &str, vendor: &str, product: &str)
        -> anyhow::Result<Vec<String>>;
}

// Try `cfgadm -c configure` for a device that reported busy, so a
// dangling controller gets another chance before discovery gives up on
// the node.
fn reconfigure(path: &str) {
    let controller = match Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix('c'))
        .and_then(|rest| rest.split(|c: char| !c.is_ascii_hexdigit()).next())
    {
        Some(c) if !c.is_empty() => format!("c{}", c),
        _ => {
            log::warn!("cannot derive controller from {}, skipping reconfigure", path);
            return;
        }
    };

    log::info!("reconfiguring controller {}", controller);

    match std::process::Command::new("/usr/sbin/cfgadm")
        .args(["-c", "configure", &controller])
        .status()
    {
        Ok(status) if status.success() => (),
        Ok(status) => log::warn!("cfgadm -c configure {} exited with {}", controller, status),
        Err(err) => log::warn!("cfgadm not usable - {}", err),
    }
}

/// Open a device node for raw command access.
///
/// A node that reports busy or missing gets one external reconfigure
/// attempt and one re-open; a second failure is final.
pub fn open_device(path: &str, allow_reconfigure: bool) -> Result<File> {
    use nix::errno::Errno;
    use nix::fcntl::{open, OFlag};
    use nix::sys::stat::Mode;
    use std::os::unix::io::FromRawFd;

    let flags = OFlag::O_RDONLY | OFlag::O_NONBLOCK;

    match open(path, flags, Mode::empty()) {
        Ok(fd) => Ok(unsafe { File::from_raw_fd(fd) }),
        Err(Errno::EBUSY | Errno::ENODEV) if allow_reconfigure => {
            reconfigure(path);
            match open(path, flags, Mode::empty()) {
                Ok(fd) => Ok(unsafe { File::from_raw_fd(fd) }),
                Err(errno) => Err(Error::DeviceUnavailable(format!(
                    "{} not available even after reconfigure - {}",
                    path, errno
                ))),
            }
        }
        Err(errno) => Err(Error::DeviceUnavailable(format!("{} - {}", path, errno))),
    }
}

/// Probe through the SCSI generic passthrough.
pub struct SgProber {
    pub allow_reconfigure: bool,
}

impl Default for SgProber {
    fn default() -> Self {
        Self {
            allow_reconfigure: true,
        }
    }
}

impl DeviceProber for SgProber {
    fn identify(&mut self, path: &str) -> anyhow::Result<DeviceIdentity> {
        let mut file = open_device(path, self.allow_reconfigure)?;
        scsi_identify(&mut file)
    }

    fn drive_serials(
        &mut self,
        path: &str,
        vendor: &str,
        product: &str,
    ) -> anyhow::Result<Vec<String>> {
        let mut file = open_device(path, self.allow_reconfigure)?;
        let drives = read_drive_identifiers(&mut file, vendor, product)?;
        Ok(drives.into_iter().map(|d| d.serial).collect())
    }
}

/// Enumerate the device nodes of a directory, following symlinks.
///
/// Unlike a single node failure during probing, a directory that
/// cannot be opened is fatal to the whole discovery call.
pub fn scan_device_directory<P: AsRef<Path>>(dir: P) -> Result<Vec<String>> {
    let dir = dir.as_ref();

    let read_dir = std::fs::read_dir(dir)
        .map_err(|err| Error::DeviceUnavailable(format!("cannot open {:?} - {}", dir, err)))?;

    let mut paths = Vec::new();
    for item in read_dir {
        let item = match item {
            Ok(item) => item,
            Err(_) => continue, // skip bad entries
        };
        paths.push(item.path().to_string_lossy().to_string());
    }

    Ok(paths)
}

// Deduplicate probed records by serial number: the first sighting owns
// the record, later sightings only contribute their path.
struct DedupTable<T> {
    table: ListHash<T>,
    order: Vec<String>,
}

impl<T> DedupTable<T> {
    fn new() -> Self {
        Self {
            table: ListHash::new(),
            order: Vec::new(),
        }
    }

    fn merge<F: FnOnce(&mut T)>(&mut self, serial: &str, record: T, merge_into: F) {
        match self.table.get_mut(serial) {
            Some(existing) => merge_into(existing),
            None => {
                if self.table.insert_unique(serial, record).is_ok() {
                    self.order.push(serial.to_string());
                }
            }
        }
    }

    fn into_first_seen_order(mut self) -> Vec<T> {
        let mut result = Vec::new();
        for serial in &self.order {
            if let Some(mut list) = self.table.remove(serial) {
                result.push(list.remove(0));
            }
        }
        result
    }
}

/// Discover the libraries behind a set of changer device nodes.
///
/// Nodes listed in `exclude` (already configured paths) are skipped. A
/// single node failing to probe is logged and skipped - it must not
/// abort discovery of the remaining nodes.
pub fn discover_libraries(
    prober: &mut dyn DeviceProber,
    paths: &[String],
    exclude: &[String],
    inquiry_table: &[InquiryEntry],
) -> Result<Vec<Library>> {
    let mut dedup = DedupTable::new();

    for path in paths {
        if exclude.iter().any(|excluded| excluded == path) {
            continue;
        }

        let identity = match prober.identify(path) {
            Ok(identity) => identity,
            Err(err) => {
                log::error!("cannot identify {}: {}", path, err);
                continue;
            }
        };

        if identity.peripheral_type != PERIPHERAL_TYPE_CHANGER {
            log::info!("{} is not a medium changer, skipping", path);
            continue;
        }

        let drive_serials =
            match prober.drive_serials(path, &identity.vendor, &identity.product) {
                Ok(serials) => serials,
                Err(err) => {
                    log::error!("cannot read element status of {}: {}", path, err);
                    continue;
                }
            };

        let library = Library {
            path: path.clone(),
            serial_no: identity.serial.clone(),
            equ_type: equ_type_for_vendor_product(
                &identity.vendor,
                &identity.product,
                inquiry_table,
            ),
            vendor_id: identity.vendor,
            product_id: identity.product,
            firmware: identity.revision,
            eq: None,
            alternate_paths: vec![path.clone()],
            drives: drive_serials
                .into_iter()
                .map(|serial| Drive {
                    serial_no: serial,
                    ..Default::default()
                })
                .collect(),
            stk_param: None,
        };

        dedup.merge(&identity.serial, library, |existing| {
            existing.alternate_paths.push(path.clone());
        });
    }

    Ok(dedup.into_first_seen_order())
}

/// Discover the drives behind a set of tape device nodes.
pub fn discover_drives(
    prober: &mut dyn DeviceProber,
    paths: &[String],
    exclude: &[String],
    inquiry_table: &[InquiryEntry],
) -> Result<Vec<Drive>> {
    let mut dedup = DedupTable::new();

    for path in paths {
        if exclude.iter().any(|excluded| excluded == path) {
            continue;
        }

        let identity = match prober.identify(path) {
            Ok(identity) => identity,
            Err(err) => {
                log::error!("cannot identify {}: {}", path, err);
                continue;
            }
        };

        if identity.peripheral_type != PERIPHERAL_TYPE_TAPE {
            log::info!("{} is not a tape drive, skipping", path);
            continue;
        }

        let drive = Drive {
            path: path.clone(),
            serial_no: identity.serial.clone(),
            equ_type: equ_type_for_vendor_product(
                &identity.vendor,
                &identity.product,
                inquiry_table,
            ),
            vendor_id: identity.vendor,
            product_id: identity.product,
            alternate_paths: vec![path.clone()],
            wwn_ids: identity.device_ids.into_iter().map(|id| id.value).collect(),
            loaded_vsn: None,
            shared: false,
        };

        dedup.merge(&identity.serial, drive, |existing| {
            existing.alternate_paths.push(path.clone());
        });
    }

    Ok(dedup.into_first_seen_order())
}

/// Replace the drive stubs a library got from its element status (only
/// serial numbers) with the fully probed drive records, matched by
/// serial number. Drives claimed by a library are removed from the
/// standalone list.
pub fn correlate_drives(libraries: &mut [Library], mut drives: Vec<Drive>) -> Vec<Drive> {
    for library in libraries.iter_mut() {
        for stub in library.drives.iter_mut() {
            if let Some(pos) = drives.iter().position(|d| d.serial_no == stub.serial_no) {
                *stub = drives.remove(pos);
            }
        }
    }
    drives
}

/// Discover all libraries and standalone drives under a device
/// directory (typically `/dev/samst` for changers and `/dev/rmt` for
/// drives), excluding already configured paths.
pub fn discover_media(
    prober: &mut dyn DeviceProber,
    changer_dir: &str,
    tape_dir: &str,
    exclude: &[String],
    inquiry_table: &[InquiryEntry],
) -> Result<(Vec<Library>, Vec<Drive>)> {
    let changer_paths = scan_device_directory(changer_dir)?;
    let tape_paths = scan_device_directory(tape_dir)?;

    let mut libraries = discover_libraries(prober, &changer_paths, exclude, inquiry_table)?;
    let drives = discover_drives(prober, &tape_paths, exclude, inquiry_table)?;

    let standalone = correlate_drives(&mut libraries, drives);

    Ok((libraries, standalone))
}

/// Discover all libraries and standalone drives behind the udev
/// enumerated SCSI generic nodes.
pub fn discover_scsi_generic(
    prober: &mut dyn DeviceProber,
    exclude: &[String],
    inquiry_table: &[InquiryEntry],
) -> Result<(Vec<Library>, Vec<Drive>)> {
    let changer_paths: Vec<String> = rmc_scsi::list_changer_nodes()
        .into_iter()
        .map(|node| node.path)
        .collect();
    let tape_paths: Vec<String> = rmc_scsi::list_tape_nodes()
        .into_iter()
        .map(|node| node.path)
        .collect();

    let mut libraries = discover_libraries(prober, &changer_paths, exclude, inquiry_table)?;
    let drives = discover_drives(prober, &tape_paths, exclude, inquiry_table)?;

    let standalone = correlate_drives(&mut libraries, drives);

    Ok((libraries, standalone))
}

/// Canned prober used by tests and by callers that already hold
/// probe results (e.g. a dry run against recorded identities).
pub struct StaticProber {
    pub identities: std::collections::HashMap<String, DeviceIdentity>,
    pub drive_serials: std::collections::HashMap<String, Vec<String>>,
}

impl DeviceProber for StaticProber {
    fn identify(&mut self, path: &str) -> anyhow::Result<DeviceIdentity> {
        self.identities
            .get(path)
            .cloned()
            .ok_or_else(|| format_err!("device {} does not answer", path))
    }

    fn drive_serials(
        &mut self,
        path: &str,
        _vendor: &str,
        _product: &str,
    ) -> anyhow::Result<Vec<String>> {
        Ok(self.drive_serials.get(path).cloned().unwrap_or_default())
    }
}
