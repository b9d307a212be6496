//! Recovery file for transfers left pending
//!
//! Holds exactly the transfers whose confirmation never showed up, in the
//! redistribution list format, so the file can be re-run as an input list.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core_types::Transfer;
use crate::redistribution::format_list;

pub struct RecoveryWriter {
    dir: PathBuf,
}

impl RecoveryWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `recovery_<YYYYmmdd_HHMMSS>.txt`, or `recovery_<...>_<n>.txt`
    /// when a run in the same second already took the name. Nothing is
    /// written for an empty list.
    pub fn write(&self, pending: &[Transfer]) -> io::Result<Option<PathBuf>> {
        if pending.is_empty() {
            return Ok(None);
        }

        fs::create_dir_all(&self.dir)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let (path, mut file) = create_unique(&self.dir, &stamp)?;
        file.write_all(format_list(pending).as_bytes())?;

        info!(
            file = %path.display(),
            count = pending.len(),
            "Recovery file created for unconfirmed transfers"
        );
        Ok(Some(path))
    }
}

fn create_unique(dir: &Path, stamp: &str) -> io::Result<(PathBuf, File)> {
    let mut suffix = 0u32;
    loop {
        let name = match suffix {
            0 => format!("recovery_{}.txt", stamp),
            n => format!("recovery_{}_{}.txt", stamp, n),
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e),
        }
    }
}
