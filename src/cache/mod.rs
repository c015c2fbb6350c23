//! Per-ticket JSON cache.
//!
//! Each tracked ticket lives in its own file under `~/.storytrail/cache`,
//! named after the ticket key. Entries are written wholesale on every refetch
//! and never patched in place. A file that no longer parses is removed on
//! read so that it gets refetched on the next run.

mod reconcile;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::types::Ticket;

pub use reconcile::reconcile;

/// Get the path to the storytrail data directory
pub fn data_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".storytrail"))
}

#[derive(Debug, Clone)]
pub struct TicketCache {
    dir: PathBuf,
}

impl TicketCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn default_location() -> Result<Self> {
        Ok(Self::new(data_dir()?.join("cache")))
    }

    /// Keys are percent-encoded, so distinct keys never share a file.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }

    pub fn save(&self, ticket: &Ticket) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create cache directory {}", self.dir.display())
        })?;

        let path = self.path_for(&ticket.key);
        let json = simd_json::to_string_pretty(ticket)
            .with_context(|| format!("Failed to serialize ticket {}", ticket.key))?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write cache file {}", path.display()))?;

        debug!(key = %ticket.key, path = %path.display(), "cached ticket");
        Ok(())
    }

    /// Read a cached ticket. Missing and corrupt entries both come back as `None`;
    /// a corrupt entry is deleted first.
    pub fn load(&self, key: &str) -> Option<Ticket> {
        let path = self.path_for(key);

        let mut bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "could not read cache entry");
                return None;
            }
        };

        match simd_json::from_slice::<Ticket>(&mut bytes) {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "discarding corrupt cache entry");
                self.discard(&path);
                None
            }
        }
    }

    fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path)
            && e.kind() != ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %e, "could not remove corrupt cache entry");
        }
    }
}
