//! Snapshot persistence: the snapshot blob format and atomic snapshot files.
mod snapshot;

pub use snapshot::{load, read_header, save, Header, SnapshotKey, State, ALGORITHM, VERSION};

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use log::info;

use crate::error::Result;

/// Reads a snapshot file, or returns None if there is none.
pub fn read_file(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(blob) => {
            info!("Read snapshot {} ({} bytes)", path.display(), blob.len());
            Ok(Some(blob))
        },
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Writes a snapshot file atomically, via a temporary file in the same
/// directory which is synced and then renamed over the target.
pub fn write_file(path: &Path, blob: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = Path::new(&temp);
    {
        let mut file = fs::File::create(temp)?;
        file.write_all(blob)?;
        file.sync_all()?;
    }
    fs::rename(temp, path)?;
    info!("Wrote snapshot {} ({} bytes)", path.display(), blob.len());
    Ok(())
}
