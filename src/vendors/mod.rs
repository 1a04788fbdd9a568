//! Network attached library parameter files.
//!
//! One `key = value` text file per library instance is the interface
//! between the catalog daemon and the vendor library software. Four
//! dialects exist (StorageTek ACSLS, Sony PetaSite, IBM 3494 and
//! ADIC/GRAU DAS); they share the line discipline and differ in the
//! recognized keys.

use std::path::Path;

use rmc_api_types::{NwLibParam, StkParam};

use crate::mediatype::DeviceType;
use crate::{Error, Result};

mod stk;
pub use stk::*;

mod sony;
pub use sony::*;

mod ibm3494;
pub use ibm3494::*;

mod adicgrau;
pub use adicgrau::*;

/// One parsed `key = value` line; `raw` is kept for diagnostics.
#[derive(Clone, Debug)]
pub(crate) struct KvLine {
    pub key: String,
    pub value: String,
    pub raw: String,
}

/// Split a parameter file into key/value lines.
///
/// Blank lines and lines starting with `#` are skipped, trailing
/// `#...` comments are stripped, and key and value are trimmed
/// independently. A line with an empty key or empty value is a hard
/// parse error - the whole file is rejected, there is no best-effort
/// partial parse.
pub(crate) fn parse_kv_lines(content: &str) -> Result<Vec<KvLine>> {
    let mut lines = Vec::new();

    for raw in content.lines() {
        if raw.starts_with('#') {
            continue;
        }

        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };

        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => continue, // not a parameter line
        };

        if key.is_empty() || value.is_empty() {
            return Err(Error::InvalidParameter(format!(
                "malformed parameter line '{}'",
                raw.trim_end()
            )));
        }

        lines.push(KvLine {
            key: key.to_string(),
            value: value.to_string(),
            raw: raw.to_string(),
        });
    }

    Ok(lines)
}

pub(crate) fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|err| {
        Error::InvalidParameter(format!("cannot read parameter file {:?} - {}", path, err))
    })
}

/// Parsed parameter file of any network attached library type.
#[derive(Clone, Debug)]
pub enum NwLibraryParam {
    Stk(StkParam),
    Sony(NwLibParam),
    Ibm3494(NwLibParam),
    AdicGrau(NwLibParam),
}

/// Read and parse the parameter file of a network attached library.
pub fn read_parameter_file<P: AsRef<Path>>(
    path: P,
    device_type: DeviceType,
) -> Result<NwLibraryParam> {
    let content = read_file(path)?;

    match device_type {
        DeviceType::StkApi => Ok(NwLibraryParam::Stk(parse_stk_param(&content)?)),
        DeviceType::SonyPsc => Ok(NwLibraryParam::Sony(parse_sony_param(&content)?)),
        DeviceType::IbmAtl => Ok(NwLibraryParam::Ibm3494(parse_ibm3494_param(&content)?)),
        DeviceType::GrauAci => Ok(NwLibraryParam::AdicGrau(parse_adicgrau_param(&content)?)),
        other => Err(Error::InvalidParameter(format!(
            "device type {:?} has no parameter file dialect",
            other
        ))),
    }
}
