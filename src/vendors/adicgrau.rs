//! ADIC/GRAU DAS parameter file dialect.
//!
//! `server` names the host running the DAS server code; `acidrive*`
//! keys carry a bare device path (the dialect has no `shared`
//! keyword). The `client` key is accepted and ignored.

use std::path::Path;

use rmc_api_types::{NwDrive, NwLibParam};

use crate::Result;

use super::{parse_kv_lines, read_file};

/// Parse an ADIC/GRAU parameter file.
pub fn parse_adicgrau_param(content: &str) -> Result<NwLibParam> {
    let mut param = NwLibParam::default();

    for line in parse_kv_lines(content)? {
        match line.key.as_str() {
            "server" => param.server = line.value,
            "client" => (), // ignored
            key if key.starts_with("acidrive") => {
                param.drives.push(NwDrive {
                    path: line.value,
                    shared: false,
                });
            }
            _ => log::warn!("ignoring unknown parameter '{}'", line.raw.trim_end()),
        }
    }

    Ok(param)
}

/// Read and parse an ADIC/GRAU parameter file.
pub fn read_adicgrau_param<P: AsRef<Path>>(path: P) -> Result<NwLibParam> {
    parse_adicgrau_param(&read_file(path)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_example() -> Result<()> {
        let param = parse_adicgrau_param(
            "client = samclient\n\
             server = dasserver\n\
             acidrive1 = /dev/rmt/6cbn\n\
             acidrive2 = /dev/rmt/7cbn\n",
        )?;

        assert_eq!(param.server, "dasserver");
        assert_eq!(param.drives.len(), 2);
        assert_eq!(param.drives[0].path, "/dev/rmt/6cbn");
        assert!(!param.drives[0].shared);
        Ok(())
    }
}
