//! Sony PetaSite parameter file dialect.
//!
//! `server` names the host running the PSC server code; `sonydrive*`
//! keys carry `<bin_number> <devpath> [shared]` - the bin number is
//! assigned by PSC and discarded here. The `userid` key is accepted
//! and ignored.

use std::path::Path;

use rmc_api_types::{NwDrive, NwLibParam, TAPE_DEVICE_DIR};

use crate::{Error, Result};

use super::{parse_kv_lines, read_file};

/// Parse a Sony parameter file.
pub fn parse_sony_param(content: &str) -> Result<NwLibParam> {
    let mut param = NwLibParam::default();

    for line in parse_kv_lines(content)? {
        match line.key.as_str() {
            "server" => param.server = line.value,
            "userid" => (), // ignored
            key if key.starts_with("sonydrive") => {
                let mut words = line.value.split_whitespace();

                // bin number first, discarded
                let _bin = words.next();

                let path = match words.next() {
                    Some(path) if path.starts_with(TAPE_DEVICE_DIR) => path,
                    _ => {
                        return Err(Error::InvalidParameter(format!(
                            "drive path must start with {} in '{}'",
                            TAPE_DEVICE_DIR,
                            line.raw.trim_end()
                        )))
                    }
                };

                let shared = matches!(words.next(), Some("shared"));

                param.drives.push(NwDrive {
                    path: path.to_string(),
                    shared,
                });
            }
            _ => log::warn!("ignoring unknown parameter '{}'", line.raw.trim_end()),
        }
    }

    Ok(param)
}

/// Read and parse a Sony parameter file.
pub fn read_sony_param<P: AsRef<Path>>(path: P) -> Result<NwLibParam> {
    parse_sony_param(&read_file(path)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_example() -> Result<()> {
        let param = parse_sony_param(
            "userid = 1000\n\
             server = psc1\n\
             sonydrive1 = 1001 /dev/rmt/0cbn\n\
             sonydrive2 = 1002 /dev/rmt/1cbn shared\n",
        )?;

        assert_eq!(param.server, "psc1");
        assert_eq!(param.drives.len(), 2);
        assert_eq!(param.drives[0].path, "/dev/rmt/0cbn");
        assert!(!param.drives[0].shared);
        assert_eq!(param.drives[1].path, "/dev/rmt/1cbn");
        assert!(param.drives[1].shared);
        Ok(())
    }

    #[test]
    fn bad_drive_path_rejected() {
        // path outside the tape device directory
        let res = parse_sony_param("sonydrive1 = 1001 /dev/dsk/c0t0d0\n");
        assert!(matches!(res, Err(Error::InvalidParameter(_))));
    }
}
