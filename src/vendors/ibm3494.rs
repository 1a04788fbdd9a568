//! IBM 3494 parameter file dialect.
//!
//! `name` is the symbolic library name from `/etc/ibmatl.conf`; device
//! path keys carry `<category_number> [shared]`. The `category` and
//! `access` keys are accepted and ignored.

use std::path::Path;

use rmc_api_types::{NwDrive, NwLibParam, TAPE_DEVICE_DIR};

use crate::Result;

use super::{parse_kv_lines, read_file};

/// Parse an IBM 3494 parameter file.
pub fn parse_ibm3494_param(content: &str) -> Result<NwLibParam> {
    let mut param = NwLibParam::default();

    for line in parse_kv_lines(content)? {
        match line.key.as_str() {
            "name" => param.server = line.value,
            "category" | "access" => (), // ignored
            key if key.starts_with(TAPE_DEVICE_DIR) => {
                let mut words = line.value.split_whitespace();

                // device category number first, discarded
                let _category = words.next();

                let shared = matches!(words.next(), Some("shared"));

                param.drives.push(NwDrive {
                    path: key.to_string(),
                    shared,
                });
            }
            _ => log::warn!("ignoring unknown parameter '{}'", line.raw.trim_end()),
        }
    }

    Ok(param)
}

/// Read and parse an IBM 3494 parameter file.
pub fn read_ibm3494_param<P: AsRef<Path>>(path: P) -> Result<NwLibParam> {
    parse_ibm3494_param(&read_file(path)?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_example() -> Result<()> {
        let param = parse_ibm3494_param(
            "name = 3494a\n\
             category = 4\n\
             access = shared\n\
             /dev/rmt/4cbn = 5001\n\
             /dev/rmt/5cbn = 5002 shared\n",
        )?;

        assert_eq!(param.server, "3494a");
        assert_eq!(param.drives.len(), 2);
        assert_eq!(param.drives[0].path, "/dev/rmt/4cbn");
        assert!(!param.drives[0].shared);
        assert!(param.drives[1].shared);
        Ok(())
    }
}
