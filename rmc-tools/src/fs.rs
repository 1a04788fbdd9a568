//! Config file helpers.

use std::path::{Path, PathBuf};

use anyhow::{format_err, Error};

/// Suffix appended to a parameter file path to form its backup path.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Backup path for a config file. Only one backup generation is kept.
pub fn backup_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut os_string = path.as_ref().as_os_str().to_owned();
    os_string.push(BACKUP_SUFFIX);
    PathBuf::from(os_string)
}

/// Move an existing config file aside before it gets rewritten.
///
/// A prior backup is overwritten. Returns the backup path when a backup
/// was made, `None` when the file did not exist yet. A live parameter
/// file is never silently overwritten without this step.
pub fn backup_existing<P: AsRef<Path>>(path: P) -> Result<Option<PathBuf>, Error> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }

    let backup = backup_path(path);
    std::fs::rename(path, &backup)
        .map_err(|err| format_err!("backup of {:?} to {:?} failed - {}", path, backup, err))?;

    Ok(Some(backup))
}
