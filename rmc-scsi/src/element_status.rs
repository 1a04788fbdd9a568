//! READ ELEMENT STATUS (B8h) for data transfer elements.
//!
//! Discovery needs the serial numbers of the drives a changer serves so
//! they can be correlated with standalone drive device nodes. The
//! command is issued with the DVCID bit set to request SCSI-3 device
//! identifiers; older robots reject that variant with CHECK CONDITION,
//! so a failure is retried exactly once with DVCID cleared.

use std::io::Read;
use std::os::unix::io::AsRawFd;

use anyhow::{bail, format_err, Error};
use endian_trait::Endian;

use proxmox_io::ReadExt;

use crate::sgutils2::{scsi_ascii_to_string, ScsiError, SgRaw};

const READ_ELEMENT_STATUS_DATALEN: usize = 0xffff;
const SCSI_CHANGER_TIMEOUT: usize = 60 * 5;

// DVCID lives in CDB byte 6, bit 0
const DVCID_BYTE: usize = 6;
const DVCID: u8 = 0x01;

// ATL M2500 ("L100") element descriptors carry the drive serial number
// at this fixed offset instead of a standard DVCID descriptor.
const L100_SERIAL_OFFSET: usize = 52;

/// Serial number of one data transfer element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriveIdentifier {
    pub element_address: u16,
    pub serial: String,
}

#[repr(C, packed)]
#[derive(Endian)]
struct ElementStatusHeader {
    first_element_address_reported: u16,
    number_of_elements_available: u16,
    reserved: u8,
    byte_count_of_report_available: [u8; 3],
}

#[repr(C, packed)]
#[derive(Endian)]
struct SubHeader {
    element_type_code: u8,
    flags: u8,
    descriptor_length: u16,
    reserved: u8,
    byte_count_of_descriptor_data_available: [u8; 3],
}

#[repr(C, packed)]
#[derive(Endian)]
struct TransferDescriptor {
    element_address: u16,
    flags1: u8,
    reserved_3: u8,
    additional_sense_code: u8,
    additional_sense_code_qualifier: u8,
    id_valid: u8,
    scsi_bus_address: u8,
    reserved_8: u8,
    flags2: u8,
    source_storage_element_address: u16,
    // device identifier descriptor follows
}

#[repr(C, packed)]
#[derive(Endian)]
struct DvcidHead {
    code_set: u8,
    identifier_type: u8,
    reserved: u8,
    identifier_len: u8,
    // identifier follows
}

fn decode_dvcid_serial<R: Read>(reader: &mut R) -> Result<Option<String>, Error> {
    let dvcid: DvcidHead = unsafe { reader.read_be_value()? };

    let serial = match (dvcid.code_set, dvcid.identifier_type) {
        (2, 0) => {
            // serial number only (Quantum Superloader3 uses this)
            let serial = reader.read_exact_allocated(dvcid.identifier_len as usize)?;
            Some(scsi_ascii_to_string(&serial))
        }
        (2, 1) => {
            if dvcid.identifier_len != 34 {
                bail!("got wrong DVCID length");
            }
            let _vendor = reader.read_exact_allocated(8)?;
            let _model = reader.read_exact_allocated(16)?;
            let serial = reader.read_exact_allocated(10)?;
            Some(scsi_ascii_to_string(&serial))
        }
        _ => None,
    };

    Ok(serial)
}

fn scsi_read_element_status_cdb(dvcid: bool, l100: bool) -> Vec<u8> {
    let mut cmd = vec![
        0xB8, // READ ELEMENT STATUS (B8h)
        4,    // element type: data transfer
        0,
        0, // start element address 0
        0xff,
        0xff, // number of elements
        0,
        0,
        0xff,
        0xff, // allocation length
        0,
        0,
    ];

    if dvcid {
        cmd[DVCID_BYTE] |= DVCID;
    }
    if l100 {
        // nonstandard option bits required by the L100 firmware
        cmd[1] |= 0x10;
        cmd[11] |= 0x80;
    }

    cmd
}

/// True for the ATL M2500 family, whose element status layout needs the
/// special casing described above.
pub fn is_l100_changer(vendor: &str, product: &str) -> bool {
    vendor.starts_with("ATL") && product.starts_with("M2500")
}

/// Decode the data transfer element pages of a READ ELEMENT STATUS
/// response into per-drive identifiers.
pub fn decode_transfer_elements(data: &[u8], l100: bool) -> Result<Vec<DriveIdentifier>, Error> {
    let mut result = Vec::new();

    let mut reader = data;

    let head: ElementStatusHeader = unsafe { reader.read_be_value()? };

    if head.number_of_elements_available == 0 {
        return Ok(result);
    }

    let len = head.byte_count_of_report_available;
    let len = ((len[0] as usize) << 16) + ((len[1] as usize) << 8) + (len[2] as usize);

    use std::cmp::Ordering;
    match len.cmp(&reader.len()) {
        Ordering::Less => reader = &reader[..len],
        Ordering::Greater => bail!(
            "wrong amount of data: expected {}, got {}",
            len,
            reader.len()
        ),
        _ => (),
    }

    while !reader.is_empty() {
        let subhead: SubHeader = unsafe { reader.read_be_value()? };

        let len = subhead.byte_count_of_descriptor_data_available;
        let mut len = ((len[0] as usize) << 16) + ((len[1] as usize) << 8) + (len[2] as usize);
        if len > reader.len() {
            len = reader.len();
        }

        let descr_data = reader.read_exact_allocated(len)?;

        let descr_len = subhead.descriptor_length as usize;
        if descr_len == 0 {
            bail!("got elements, but descriptor length 0");
        }

        if subhead.element_type_code != 4 {
            // only data transfer elements were requested
            continue;
        }

        for descriptor in descr_data.chunks_exact(descr_len) {
            let mut reader = descriptor;

            let desc: TransferDescriptor = unsafe { reader.read_be_value()? };

            let serial = if l100 {
                if descriptor.len() <= L100_SERIAL_OFFSET {
                    bail!("element descriptor too short for L100 serial number");
                }
                let raw = &descriptor[L100_SERIAL_OFFSET..];
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                scsi_ascii_to_string(&raw[..end])
            } else {
                match decode_dvcid_serial(&mut reader) {
                    Ok(Some(serial)) => serial,
                    _ => String::new(),
                }
            };

            if serial.is_empty() {
                let element_address = desc.element_address;
                bail!(
                    "drive identifier could not be obtained for element {}",
                    element_address
                );
            }

            result.push(DriveIdentifier {
                element_address: desc.element_address,
                serial,
            });
        }
    }

    Ok(result)
}

/// Issue READ ELEMENT STATUS with the given executor, honoring the
/// DVCID fallback contract: the SCSI-3 variant (DVCID set) is tried
/// first, a failure is retried exactly once with DVCID cleared, a
/// second failure is final.
pub fn read_drive_identifiers_with<E>(
    exec: &mut E,
    vendor: &str,
    product: &str,
) -> Result<Vec<DriveIdentifier>, Error>
where
    E: FnMut(&[u8]) -> Result<Vec<u8>, ScsiError>,
{
    let l100 = is_l100_changer(vendor, product);

    let cmd = scsi_read_element_status_cdb(true, l100);
    let data = match exec(&cmd) {
        Ok(data) => data,
        Err(err) => {
            // SCSI-2 fallback for robots that reject the DVCID variant
            log::info!(
                "read element status with DVCID failed ({}), retrying without",
                err
            );
            let cmd = scsi_read_element_status_cdb(false, l100);
            exec(&cmd).map_err(|err| format_err!("read element status (B8h) failed - {}", err))?
        }
    };

    decode_transfer_elements(&data, l100)
        .map_err(|err| format_err!("decode element status failed - {}", err))
}

/// Read the drive serial numbers of an open changer device.
pub fn read_drive_identifiers<F: AsRawFd>(
    file: &mut F,
    vendor: &str,
    product: &str,
) -> Result<Vec<DriveIdentifier>, Error> {
    let mut sg_raw = SgRaw::new(file, READ_ELEMENT_STATUS_DATALEN)?;
    sg_raw.set_timeout(SCSI_CHANGER_TIMEOUT);

    let mut exec = |cmd: &[u8]| sg_raw.do_command(cmd).map(|data| data.to_vec());

    read_drive_identifiers_with(&mut exec, vendor, product)
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::{format_err, Error};

    pub(crate) fn build_transfer_element_page(serials: &[&str], l100: bool) -> Vec<u8> {
        let mut descs: Vec<Vec<u8>> = Vec::new();

        for (i, serial) in serials.iter().enumerate() {
            let mut desc = Vec::new();
            desc.extend_from_slice(&(i as u16).to_be_bytes()); // element address
            desc.push(0x01); // full
            desc.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0]);
            desc.extend_from_slice(&0u16.to_be_bytes()); // source address

            if l100 {
                desc.resize(L100_SERIAL_OFFSET, 0);
                desc.extend_from_slice(serial.as_bytes());
                desc.push(0);
                desc.resize(L100_SERIAL_OFFSET + 12, 0);
            } else {
                // DVCID head, code-set 2 (ASCII), id-type 0
                desc.push(2);
                desc.push(0);
                desc.push(0);
                desc.push(serial.len() as u8);
                desc.extend_from_slice(serial.as_bytes());
            }
            descs.push(desc);
        }

        let desc_len = descs.iter().map(|d| d.len()).max().unwrap_or(0);
        for desc in descs.iter_mut() {
            desc.resize(desc_len, 0);
        }
        let byte_count = 8 + desc_len * descs.len();

        let mut page = Vec::new();
        page.extend_from_slice(&0u16.to_be_bytes()); // first element address
        page.extend_from_slice(&(descs.len() as u16).to_be_bytes());
        page.push(0);
        page.extend_from_slice(&(byte_count as u32).to_be_bytes()[1..]);

        page.push(4); // data transfer elements
        page.push(0);
        page.extend_from_slice(&(desc_len as u16).to_be_bytes());
        page.push(0);
        let descriptor_byte_count = (desc_len * descs.len()) as u32;
        page.extend_from_slice(&descriptor_byte_count.to_be_bytes()[1..]);

        for desc in descs {
            page.extend_from_slice(&desc);
        }

        page
    }

    #[test]
    fn decode_dvcid_serials() -> Result<(), Error> {
        let page = build_transfer_element_page(&["DRV001", "DRV002"], false);
        let drives = decode_transfer_elements(&page, false)?;
        assert_eq!(drives.len(), 2);
        assert_eq!(drives[0].serial, "DRV001");
        assert_eq!(drives[0].element_address, 0);
        assert_eq!(drives[1].serial, "DRV002");
        Ok(())
    }

    #[test]
    fn decode_l100_serials() -> Result<(), Error> {
        let page = build_transfer_element_page(&["L100DRV"], true);
        let drives = decode_transfer_elements(&page, true)?;
        assert_eq!(drives.len(), 1);
        assert_eq!(drives[0].serial, "L100DRV");
        Ok(())
    }

    #[test]
    fn dvcid_fallback_retries_exactly_once() -> Result<(), Error> {
        let page = build_transfer_element_page(&["DRV001"], false);

        let mut attempts: Vec<u8> = Vec::new();
        let mut exec = |cmd: &[u8]| {
            attempts.push(cmd[DVCID_BYTE] & DVCID);
            if cmd[DVCID_BYTE] & DVCID != 0 {
                Err(ScsiError::Error(format_err!("CHECK CONDITION")))
            } else {
                Ok(page.clone())
            }
        };

        let drives = read_drive_identifiers_with(&mut exec, "QUANTUM", "Scalar i500")?;
        assert_eq!(drives.len(), 1);
        assert_eq!(drives[0].serial, "DRV001");
        // first with DVCID set, then exactly one retry without
        assert_eq!(attempts, vec![1, 0]);
        Ok(())
    }

    #[test]
    fn dvcid_fallback_fails_after_second_error() {
        let mut attempts = 0;
        let mut exec = |_cmd: &[u8]| -> Result<Vec<u8>, ScsiError> {
            attempts += 1;
            Err(ScsiError::Error(format_err!("CHECK CONDITION")))
        };

        assert!(read_drive_identifiers_with(&mut exec, "STK", "SL500").is_err());
        // no third retry
        assert_eq!(attempts, 2);
    }

    #[test]
    fn l100_quirk_sets_nonstandard_cdb_bits() {
        let cmd = scsi_read_element_status_cdb(true, true);
        assert_eq!(cmd[1] & 0x10, 0x10);
        assert_eq!(cmd[11] & 0x80, 0x80);

        let cmd = scsi_read_element_status_cdb(true, false);
        assert_eq!(cmd[1], 4);
        assert_eq!(cmd[11], 0);
    }
}
