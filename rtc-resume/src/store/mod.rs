
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info};

use crate::snapshot::{SnapshotAggregate, codec};
use shared::error::Result;

/// Durable home of the latest [`SnapshotAggregate`]. One file, overwritten as a whole;
/// no history is kept.
///
/// Snapshots carry DTLS master secrets, so the file and a created parent directory are
/// readable by the owner only.
pub struct SnapshotStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the stored aggregate. The bytes go to a temporary sibling that is
    /// renamed over the target, so a crash leaves either the old or the new file.
    /// Concurrent saves are serialized.
    pub fn save(&self, aggregate: &SnapshotAggregate) -> Result<()> {
        let raw = codec::marshal(aggregate)?;

        let _guard = self.write_lock.lock()?;
        let temp_path = self.path.with_extension("tmp");

        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            create_dir(parent)?;
        }

        {
            let mut file = open_for_write(&temp_path)?;
            file.write_all(&raw)?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;

        // the rename is only durable once the directory entry is
        if let Some(parent) = parent {
            File::open(parent)?.sync_all()?;
        }

        debug!(
            "saved {} sessions ({} bytes) to {}",
            aggregate.len(),
            raw.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Loads the stored aggregate. `None` when nothing has been saved yet; a file that
    /// does not decode is an error, never an empty aggregate.
    pub fn load(&self) -> Result<Option<SnapshotAggregate>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("no snapshot at {}", self.path.display());
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let aggregate = codec::unmarshal(&raw)?;
        info!(
            "loaded {} sessions from {}",
            aggregate.len(),
            self.path.display()
        );
        Ok(Some(aggregate))
    }
}

#[cfg(unix)]
fn create_dir(dir: &Path) -> Result<()> {
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(unix)]
fn open_for_write(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?)
}

#[cfg(not(unix))]
fn open_for_write(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}
