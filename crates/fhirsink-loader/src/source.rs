//! Filesystem bundle source.
//!
//! Enumeration is deterministic (sorted by file name, not directory order)
//! and restartable: `discover` returns an owned snapshot of the paths, so a
//! run can be replayed against the same sequence. Idempotent persistence
//! makes order independence a property tests can rely on, but a stable order
//! keeps logs and failures reproducible.

use std::path::{Path, PathBuf};

use fhirsink_core::Bundle;
use tracing::debug;

use crate::error::LoadError;

pub struct BundleSource {
    dir: PathBuf,
}

impl BundleSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lists every `.json` file in the source directory, sorted by name.
    /// A source that cannot be listed is fatal.
    pub fn discover(&self) -> Result<Vec<PathBuf>, LoadError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| LoadError::Source {
            dir: self.dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LoadError::Source {
                dir: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            } else {
                debug!(path = %path.display(), "Ignoring non-bundle file");
            }
        }

        paths.sort();
        Ok(paths)
    }
}

/// The bundle's identity in logs and errors: its file name.
pub fn bundle_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads and parses one bundle document.
pub fn read_bundle(path: &Path, name: &str) -> Result<Bundle, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Read {
        bundle: name.to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| LoadError::Parse {
        bundle: name.to_string(),
        source,
    })
}
