//! JSON state file holding the registry snapshot between invocations.

use anyhow::{anyhow, Context, Result};
use avatar_registry::{Registry, RegistryConfig, RegistrySnapshot};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hold on a state file for the lifetime of one command.
///
/// The lock file is never removed: another process may already have it open
/// and would otherwise lock an unlinked inode.
pub struct StateFile {
    path: PathBuf,
    lock: Option<File>,
}

impl StateFile {
    /// Exclusive hold for commands that write the registry back.
    pub fn acquire(path: &Path) -> Result<Self> {
        let dir = parent_dir(path);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory {}", dir.display()))?;

        let lock_path = lock_path(path);
        let lock = open_lock(&lock_path)?;

        if let Err(err) = FileExt::try_lock_exclusive(&lock) {
            return Err(anyhow!(
                "State file {} is locked by another process ({}). \
                 Stop the other invocation and retry.",
                path.display(),
                err
            ));
        }

        lock.set_len(0)?;
        writeln!(&lock, "pid={}", std::process::id())?;

        Ok(Self {
            path: path.to_path_buf(),
            lock: Some(lock),
        })
    }

    /// Shared hold for read-only commands. Touches nothing on disk when no
    /// state exists yet.
    pub fn acquire_shared(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                path: path.to_path_buf(),
                lock: None,
            });
        }

        let lock = open_lock(&lock_path(path))?;
        if let Err(err) = FileExt::try_lock_shared(&lock) {
            return Err(anyhow!(
                "State file {} is being written by another process ({})",
                path.display(),
                err
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock: Some(lock),
        })
    }

    /// Load the registry, or start an empty one if no state exists yet.
    pub fn load(&self, config: RegistryConfig) -> Result<Registry> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no state file; starting empty registry");
            return Ok(Registry::new(config));
        }

        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file {}", self.path.display()))?;
        let snapshot = RegistrySnapshot::from_json(&data)
            .with_context(|| format!("Failed to parse state file {}", self.path.display()))?;
        let registry = Registry::from_snapshot(config, snapshot)?;
        debug!(
            path = %self.path.display(),
            avatars = registry.total_records(),
            "registry state loaded"
        );
        Ok(registry)
    }

    /// Write the registry atomically (temp file, fsync, then rename).
    pub fn save(&self, registry: &Registry) -> Result<()> {
        let json = registry.snapshot().to_json()?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent_dir(&self.path))?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write state file {}", self.path.display()))?;
        debug!(path = %self.path.display(), "registry state saved");
        Ok(())
    }
}

impl Drop for StateFile {
    fn drop(&mut self) {
        if let Some(lock) = &self.lock {
            let _ = FileExt::unlock(lock);
        }
    }
}

fn lock_path(path: &Path) -> PathBuf {
    path.with_extension("lock")
}

fn open_lock(lock_path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(lock_path)
        .with_context(|| format!("Failed to open lock file {}", lock_path.display()))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
