//! StorageTek ACSLS parameter file dialect.
//!
//! Recognized scalar keys: `hostname`, `access`, `portnum`,
//! `ssi_inet_portnum`, `csi_hostport`, `ssihost`. The `capid` key
//! carries a parenthesized `(acs=N, lsm=N, cap=N)` triple; `capacity`
//! a parenthesized `idx = value` list; any key starting with the tape
//! device directory is a device path entry with its ACS drive
//! coordinates and an optional trailing `shared` word.

use std::io::Write;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use rmc_api_types::{StkCap, StkCapacity, StkDevice, StkParam, TAPE_DEVICE_DIR};
use rmc_tools::fs::backup_existing;

use crate::{Error, Result};

use super::{parse_kv_lines, read_file};

lazy_static! {
    static ref ASSIGN_RE: Regex = Regex::new(r"\s*=\s*").unwrap();
}

/// Split a parenthesized `key = value` group into pairs.
///
/// The pairs between the parentheses may be separated by a comma, a
/// colon or by whitespace - all three must be accepted.
fn parse_paren_kv(value: &str) -> Result<Vec<(String, String)>> {
    let start = value.find('(').ok_or_else(|| {
        Error::InvalidParameter(format!("missing '(' in parameter value '{}'", value))
    })?;
    let end = value.rfind(')').ok_or_else(|| {
        Error::InvalidParameter(format!("missing ')' in parameter value '{}'", value))
    })?;
    if end < start {
        return Err(Error::InvalidParameter(format!(
            "mismatched parentheses in '{}'",
            value
        )));
    }

    let inner = ASSIGN_RE.replace_all(&value[start + 1..end], "=");

    let mut pairs = Vec::new();
    for token in inner.split(|c: char| c == ',' || c == ':' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (key, val) = token.split_once('=').ok_or_else(|| {
            Error::InvalidParameter(format!("expected key=value, got '{}'", token))
        })?;
        pairs.push((key.to_string(), val.to_string()));
    }

    Ok(pairs)
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::InvalidParameter(format!("bad numeric value '{}' for '{}'", value, key)))
}

/// Parse the `capid = (acs=N, lsm=N, cap=N)` cartridge access port
/// description.
fn parse_stk_cap(value: &str) -> Result<StkCap> {
    let mut cap = StkCap::default();

    for (key, val) in parse_paren_kv(value)? {
        match key.as_str() {
            "acs" => cap.acs = parse_int(&key, &val)?,
            "lsm" => cap.lsm = parse_int(&key, &val)?,
            "cap" => cap.cap = parse_int(&key, &val)?,
            _ => {
                return Err(Error::InvalidParameter(format!(
                    "unknown capid keyword '{}'",
                    key
                )))
            }
        }
    }

    Ok(cap)
}

/// Parse the optional `capacity = ( idx1 = val1, idx2 = val2 ... )`
/// media capacity overrides (values in units of 1024 bytes).
fn parse_stk_capacity(value: &str) -> Result<Vec<StkCapacity>> {
    let mut list = Vec::new();

    for (idx, val) in parse_paren_kv(value)? {
        list.push(StkCapacity {
            index: parse_int("capacity index", &idx)?,
            value: parse_int("capacity value", &val)?,
        });
    }

    Ok(list)
}

/// Parse a `devpath = (acs=N, lsm=N, panel=N, drive=N) [shared]` drive
/// entry.
fn parse_stk_device(path: &str, value: &str) -> Result<StkDevice> {
    let mut dev = StkDevice {
        path: path.to_string(),
        ..Default::default()
    };

    for (key, val) in parse_paren_kv(value)? {
        match key.as_str() {
            "acs" => dev.acs = parse_int(&key, &val)?,
            "lsm" => dev.lsm = parse_int(&key, &val)?,
            "panel" => dev.panel = parse_int(&key, &val)?,
            "drive" => dev.drive = parse_int(&key, &val)?,
            _ => {
                return Err(Error::InvalidParameter(format!(
                    "unknown device path keyword '{}'",
                    key
                )))
            }
        }
    }

    // optional bare word after the close parenthesis
    if let Some(rest) = value.rfind(')').map(|pos| value[pos + 1..].trim()) {
        if rest == "shared" {
            dev.shared = true;
        } else if !rest.is_empty() {
            return Err(Error::InvalidParameter(format!(
                "unexpected trailing '{}' in device path entry",
                rest
            )));
        }
    }

    Ok(dev)
}

/// Parse a StorageTek parameter file.
pub fn parse_stk_param(content: &str) -> Result<StkParam> {
    let mut param = StkParam {
        ssi_inet_portnum: -1,
        csi_hostport: -1,
        ..Default::default()
    };

    for line in parse_kv_lines(content)? {
        match line.key.as_str() {
            "hostname" => param.hostname = line.value,
            "access" => param.access = line.value,
            "portnum" => param.portnum = parse_int(&line.key, &line.value)?,
            "ssi_inet_portnum" => param.ssi_inet_portnum = parse_int(&line.key, &line.value)?,
            "csi_hostport" => param.csi_hostport = parse_int(&line.key, &line.value)?,
            "ssihost" => param.ssi_host = line.value,
            "capid" => param.cap = parse_stk_cap(&line.value)?,
            "capacity" => param.capacity_list = parse_stk_capacity(&line.value)?,
            key if key.starts_with(TAPE_DEVICE_DIR) => {
                let dev = parse_stk_device(key, &line.value)?;
                param.device_list.push(dev);
            }
            _ => {
                // unrecognized keys are ignored
                log::warn!("ignoring unknown parameter '{}'", line.raw.trim_end());
            }
        }
    }

    Ok(param)
}

/// Read and parse a StorageTek parameter file.
pub fn read_stk_param<P: AsRef<Path>>(path: P) -> Result<StkParam> {
    parse_stk_param(&read_file(path)?)
}

fn format_stk_param(param: &StkParam) -> String {
    let mut out = String::new();

    if !param.access.is_empty() {
        out.push_str(&format!("access = {}\n", param.access));
    }
    out.push_str(&format!("hostname = {}\n", param.hostname));
    out.push_str(&format!("portnum = {}\n", param.portnum));
    if !param.ssi_host.is_empty() {
        out.push_str(&format!("ssihost = {}\n", param.ssi_host));
    }
    if param.ssi_inet_portnum > 0 {
        out.push_str(&format!("ssi_inet_portnum = {}\n", param.ssi_inet_portnum));
    }
    if param.csi_hostport > 0 {
        out.push_str(&format!("csi_hostport = {}\n", param.csi_hostport));
    }
    out.push_str(&format!(
        "capid = (acs={}, lsm={}, cap={})\n",
        param.cap.acs, param.cap.lsm, param.cap.cap
    ));

    if !param.capacity_list.is_empty() {
        out.push_str("capacity = ( ");
        for (i, cap) in param.capacity_list.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!("{} = {}", cap.index, cap.value));
        }
        out.push_str(" )\n");
    }

    for dev in &param.device_list {
        out.push_str(&format!(
            "{} = (acs={}, lsm={}, panel={}, drive={}){}\n",
            dev.path,
            dev.acs,
            dev.lsm,
            dev.panel,
            dev.drive,
            if dev.shared { " shared" } else { "" }
        ));
    }

    out
}

fn write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();

    // never silently overwrite a live parameter file
    backup_existing(path).map_err(|err| Error::InvalidParameter(err.to_string()))?;

    let mut file = std::fs::File::create(path).map_err(|err| {
        Error::InvalidParameter(format!("cannot write parameter file {:?} - {}", path, err))
    })?;
    file.write_all(content.as_bytes()).map_err(|err| {
        Error::InvalidParameter(format!("cannot write parameter file {:?} - {}", path, err))
    })?;

    Ok(())
}

/// Regenerate a StorageTek parameter file from the in-memory structure.
///
/// An existing destination is renamed to its backup path first.
pub fn write_stk_param<P: AsRef<Path>>(param: &StkParam, path: P) -> Result<()> {
    if param.device_list.is_empty() {
        return Err(Error::InvalidParameter(
            "StorageTek parameter file requires at least one device entry".to_string(),
        ));
    }

    write_file(path, &format_stk_param(param))
}

/// Rewrite a StorageTek parameter file, toggling the `shared` flag of
/// one device entry.
pub fn update_stk_param<P: AsRef<Path>>(
    param: &mut StkParam,
    path: P,
    drive_path: &str,
    shared: bool,
) -> Result<()> {
    for dev in param.device_list.iter_mut() {
        if dev.path == drive_path {
            dev.shared = shared;
        }
    }

    write_stk_param(param, path)
}

/// Retire a StorageTek parameter file, keeping it as the backup
/// generation.
pub fn remove_stk_param<P: AsRef<Path>>(path: P) -> Result<()> {
    backup_existing(path).map_err(|err| Error::InvalidParameter(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    const EXAMPLE: &str = r#"
# StorageTek ACSLS library
access = sam
hostname = acsls1.example.org
portnum = 50004
ssi_inet_portnum = 4300
capid = (acs=0, lsm=1, cap=2)
capacity = ( 20 = 419430400, 34 = 838860800 )
/dev/rmt/0cbn = (acs=0, lsm=1, panel=0, drive=0)
/dev/rmt/1cbn = (acs=0, lsm=1, panel=0, drive=1) shared
"#;

    #[test]
    fn parse_example() -> Result<()> {
        let param = parse_stk_param(EXAMPLE)?;

        assert_eq!(param.hostname, "acsls1.example.org");
        assert_eq!(param.access, "sam");
        assert_eq!(param.portnum, 50004);
        assert_eq!(param.ssi_inet_portnum, 4300);
        assert_eq!(param.csi_hostport, -1);
        assert_eq!(param.cap, StkCap { acs: 0, lsm: 1, cap: 2 });

        assert_eq!(param.capacity_list.len(), 2);
        assert_eq!(param.capacity_list[0].index, 20);
        assert_eq!(param.capacity_list[0].value, 419430400);

        assert_eq!(param.device_list.len(), 2);
        assert_eq!(param.device_list[0].path, "/dev/rmt/0cbn");
        assert!(!param.device_list[0].shared);
        assert_eq!(param.device_list[1].drive, 1);
        assert!(param.device_list[1].shared);
        Ok(())
    }

    #[test]
    fn capid_delimiter_variants() -> Result<()> {
        for value in [
            "capid = (acs=0, lsm=1, cap=2)",
            "capid = (acs=0: lsm=1: cap=2)",
            "capid = (acs=0 lsm=1 cap=2)",
            "capid = ( acs = 0 , lsm = 1 , cap = 2 )",
        ] {
            let param = parse_stk_param(&format!("hostname = h\n{}\n", value))?;
            assert_eq!(param.cap, StkCap { acs: 0, lsm: 1, cap: 2 }, "value: {}", value);
        }
        Ok(())
    }

    #[test]
    fn malformed_lines_abort() {
        // missing value
        assert!(parse_stk_param("hostname =\n").is_err());
        // unbalanced parens in capid
        assert!(parse_stk_param("capid = (acs=0, lsm=1\n").is_err());
        // garbage port number
        assert!(parse_stk_param("portnum = fifty\n").is_err());
    }

    #[test]
    fn write_round_trip() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("rmc-stk-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stk50");

        let param = parse_stk_param(EXAMPLE)?;
        write_stk_param(&param, &path)?;
        let reparsed = read_stk_param(&path)?;

        // parse . write . parse = parse
        assert_eq!(param, reparsed);

        // a second write must move the first file to the backup path
        write_stk_param(&reparsed, &path)?;
        assert!(dir.join("stk50.bak").exists());

        std::fs::remove_dir_all(&dir).unwrap();
        Ok(())
    }

    #[test]
    fn update_toggles_shared_flag() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("rmc-stk-upd-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stk50");

        let mut param = parse_stk_param(EXAMPLE)?;
        update_stk_param(&mut param, &path, "/dev/rmt/0cbn", true)?;

        let reparsed = read_stk_param(&path)?;
        assert!(reparsed.device_list[0].shared);
        assert!(reparsed.device_list[1].shared);

        std::fs::remove_dir_all(&dir).unwrap();
        Ok(())
    }
}
