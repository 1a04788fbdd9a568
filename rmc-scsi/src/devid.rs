//! Device identification descriptors (INQUIRY page 0x83).

use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};

use crate::sgutils2::scsi_ascii_to_string;

const CODE_SET_BINARY: u8 = 1;
const CODE_SET_ASCII: u8 = 2;

pub const ID_TYPE_T10: u8 = 1;
pub const ID_TYPE_EUI64: u8 = 2;
pub const ID_TYPE_NAA: u8 = 3;

/// One identification descriptor from the device identification page.
///
/// Multiple descriptors may exist per device. The same physical device
/// can show up behind several paths with differing descriptor sets, so
/// deduplication must key on the unit serial number, never on these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceId {
    pub id_type: u8,
    pub value: String,
}

/// Decode the identification descriptor list of an INQUIRY page 0x83
/// response.
///
/// Descriptors are a sequence of (code-set, id-type, length, value)
/// records. Code-set 1 is binary data, rendered as hex; code-set 2 is
/// ASCII. T10 and EUI-64 identifiers longer than 24 characters carry a
/// vendor-id padding prefix that is stripped before use; NAA
/// identifiers are used verbatim.
pub fn parse_device_id_page(data: &[u8]) -> Result<Vec<DeviceId>, Error> {
    if data.len() < 4 {
        bail!("identification page too short ({} bytes)", data.len());
    }

    if (data[0] & 0x1f) == 0x1f {
        bail!("peripheral device type is unknown");
    }

    let page_len = ((data[2] as usize) << 8) + data[3] as usize;
    if page_len == 0 {
        bail!("identification page length field is zero");
    }
    if 4 + page_len > data.len() {
        bail!(
            "identification page length {} exceeds response size {}",
            page_len,
            data.len()
        );
    }

    let mut ids = Vec::new();
    let mut descriptors = &data[4..4 + page_len];

    while !descriptors.is_empty() {
        if descriptors.len() < 4 {
            bail!("truncated identification descriptor header");
        }
        let code_set = descriptors[0] & 0xf;
        let id_type = descriptors[1] & 0xf;
        let len = descriptors[3] as usize;
        if len == 0 || 4 + len > descriptors.len() {
            bail!("invalid identification descriptor length {}", len);
        }

        let raw = &descriptors[4..4 + len];
        let decoded = match code_set {
            CODE_SET_BINARY => hex::encode(raw),
            CODE_SET_ASCII => scsi_ascii_to_string(raw),
            _ => {
                // other code sets are not decoded
                descriptors = &descriptors[4 + len..];
                continue;
            }
        };

        let value = match id_type {
            ID_TYPE_T10 | ID_TYPE_EUI64 if decoded.len() > 24 => decoded[24..].trim().to_string(),
            _ => decoded.trim().to_string(),
        };

        ids.push(DeviceId { id_type, value });

        descriptors = &descriptors[4 + len..];
    }

    Ok(ids)
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Error;

    fn build_page(descriptors: &[(u8, u8, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (code_set, id_type, value) in descriptors {
            body.push(*code_set);
            body.push(*id_type);
            body.push(0);
            body.push(value.len() as u8);
            body.extend_from_slice(value);
        }

        let mut page = vec![0x08, 0x83];
        page.extend_from_slice(&(body.len() as u16).to_be_bytes());
        page.extend_from_slice(&body);
        page
    }

    #[test]
    fn ascii_and_binary_descriptors() -> Result<(), Error> {
        let page = build_page(&[
            (CODE_SET_ASCII, ID_TYPE_T10, b"SN12345 "),
            (CODE_SET_BINARY, ID_TYPE_NAA, &[0x50, 0x01, 0x04, 0xf0]),
        ]);

        let ids = parse_device_id_page(&page)?;
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].value, "SN12345");
        assert_eq!(ids[1].value, "500104f0");
        Ok(())
    }

    #[test]
    fn long_t10_identifier_strips_vendor_padding() -> Result<(), Error> {
        // 8 chars vendor id + 16 chars padding, then the real id
        let long_id = b"VENDOR  0123456789ABCDEFREALSERIAL";
        let page = build_page(&[(CODE_SET_ASCII, ID_TYPE_T10, long_id)]);

        let ids = parse_device_id_page(&page)?;
        assert_eq!(ids[0].value, "REALSERIAL");
        Ok(())
    }

    #[test]
    fn naa_identifier_used_verbatim() -> Result<(), Error> {
        // NAA identifiers keep their full length even past 24 chars
        let long_naa: Vec<u8> = (0..16).collect();
        let page = build_page(&[(CODE_SET_BINARY, ID_TYPE_NAA, &long_naa)]);

        let ids = parse_device_id_page(&page)?;
        assert_eq!(ids[0].value.len(), 32);
        Ok(())
    }

    #[test]
    fn malformed_pages_rejected() {
        assert!(parse_device_id_page(&[0x08, 0x83]).is_err());
        // zero page length
        assert!(parse_device_id_page(&[0x08, 0x83, 0, 0]).is_err());
        // descriptor length past end of page
        assert!(parse_device_id_page(&[0x08, 0x83, 0, 4, 2, 1, 0, 200]).is_err());
    }
}
