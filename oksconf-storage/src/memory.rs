use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
};

use anyhow::{anyhow, bail, Result};
use camino::{Utf8Path, Utf8PathBuf};

use super::Storage;

/// An in-memory set of files, keyed by normalized path
///
/// Directories exist implicitly as the parents of files.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RefCell<BTreeMap<Utf8PathBuf, String>>,
}

impl MemoryStorage {
    /// Constructs an empty storage
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the paths of every file held, in order
    pub fn to_path_set(&self) -> BTreeSet<Utf8PathBuf> {
        self.files.borrow().keys().cloned().collect()
    }
}

impl Storage for MemoryStorage {
    fn is_file(&self, path: impl AsRef<Utf8Path>) -> bool {
        let path = super::normalize(path);
        self.files.borrow().contains_key(&path)
    }

    fn is_directory(&self, path: impl AsRef<Utf8Path>) -> bool {
        let path = super::normalize(path);
        if path == "/" || path == "." {
            return true;
        }
        self.files
            .borrow()
            .keys()
            .any(|file| file.starts_with(&path) && file != &path)
    }

    fn list_directory(&self, path: impl AsRef<Utf8Path>) -> Result<Vec<String>> {
        let path = super::normalize(path);
        if !self.is_directory(&path) {
            bail!("No such directory: {}", path);
        }
        let mut listing = BTreeSet::new();
        for file in self.files.borrow().keys() {
            let relative = if path == "." {
                Some(file.as_path())
            } else {
                file.strip_prefix(&path).ok()
            };
            if let Some(name) = relative.and_then(|rel| rel.components().next()) {
                listing.insert(name.as_str().to_owned());
            }
        }
        Ok(listing.into_iter().collect())
    }

    fn read_file(&self, path: impl AsRef<Utf8Path>) -> Result<String> {
        let path = super::normalize(path);
        self.files
            .borrow()
            .get(&path)
            .cloned()
            .ok_or_else(|| anyhow!("No such file: {}", path))
    }

    fn write_file(&self, path: impl AsRef<Utf8Path>, content: String) -> Result<()> {
        let path = super::normalize(path);
        if self.is_directory(&path) {
            bail!("Cannot write a directory: {}", path);
        }
        if let Some((parent, _)) = super::split(&path) {
            if self.is_file(parent) {
                bail!("Parent is a file: {}", parent);
            }
        }
        self.files.borrow_mut().insert(path, content);
        Ok(())
    }

    fn remove_file(&self, path: impl AsRef<Utf8Path>) -> Result<()> {
        let path = super::normalize(path);
        self.files
            .borrow_mut()
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("No such file: {}", path))
    }
}
