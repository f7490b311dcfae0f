use std::fs;

use anyhow::{Context, Result};
use camino::Utf8Path;

use super::Storage;

/// Access to files on a real file system
#[derive(Debug, Default)]
pub struct DiskStorage {}

impl DiskStorage {
    /// Constructs access to the real file system
    pub fn new() -> Self {
        DiskStorage {}
    }
}

impl Storage for DiskStorage {
    fn is_file(&self, path: impl AsRef<Utf8Path>) -> bool {
        fs::metadata(path.as_ref())
            .map(|m| m.file_type().is_file())
            .unwrap_or(false)
    }

    fn is_directory(&self, path: impl AsRef<Utf8Path>) -> bool {
        fs::metadata(path.as_ref())
            .map(|m| m.file_type().is_dir())
            .unwrap_or(false)
    }

    fn list_directory(&self, path: impl AsRef<Utf8Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        let mut listing = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("Listing directory: {path}"))? {
            let entry = entry?;
            let file_name = entry.file_name();
            listing.push(file_name.to_string_lossy().into_owned());
        }
        listing.sort();
        Ok(listing)
    }

    fn read_file(&self, path: impl AsRef<Utf8Path>) -> Result<String> {
        let path = path.as_ref();
        fs::read_to_string(path).with_context(|| format!("Reading file: {path}"))
    }

    fn write_file(&self, path: impl AsRef<Utf8Path>, content: String) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating directory: {parent}"))?;
        }
        fs::write(path, content).with_context(|| format!("Writing file: {path}"))
    }

    fn remove_file(&self, path: impl AsRef<Utf8Path>) -> Result<()> {
        let path = path.as_ref();
        fs::remove_file(path).with_context(|| format!("Removing file: {path}"))
    }
}
