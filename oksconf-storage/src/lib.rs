//! Provides an abstract [`Storage`] trait for reading and writing configuration files, together
//! with a physical ([`DiskStorage`]) and virtual ([`MemoryStorage`]) implementation.
#![warn(missing_docs)]

use anyhow::Result;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

mod memory;
mod physical;

pub use self::{memory::MemoryStorage, physical::DiskStorage};

/// Operations on the files that make up configuration databases
///
/// All operations take `&self` so that several database sessions may share one storage; write
/// access is expected to be used strictly sequentially.
pub trait Storage {
    /// Returns true if the path exists as a file
    fn is_file(&self, path: impl AsRef<Utf8Path>) -> bool;

    /// Returns true if the path exists as a directory
    fn is_directory(&self, path: impl AsRef<Utf8Path>) -> bool;

    /// Returns true if the path exists at all
    fn exists(&self, path: impl AsRef<Utf8Path>) -> bool {
        let path = path.as_ref();
        self.is_file(path) || self.is_directory(path)
    }

    /// Lists the names of the entries in the given directory
    fn list_directory(&self, path: impl AsRef<Utf8Path>) -> Result<Vec<String>>;

    /// Reads the contents of the given file
    fn read_file(&self, path: impl AsRef<Utf8Path>) -> Result<String>;

    /// Writes (creating or replacing) the file with the given content
    ///
    /// Missing parent directories are created.
    fn write_file(&self, path: impl AsRef<Utf8Path>, content: String) -> Result<()>;

    /// Removes the given file
    fn remove_file(&self, path: impl AsRef<Utf8Path>) -> Result<()>;
}

/// Lexically normalizes a path, removing `.` components and resolving `..` against preceding
/// components where possible
///
/// No symlinks are followed. Leading `..` components of a relative path are kept.
pub fn normalize(path: impl AsRef<Utf8Path>) -> Utf8PathBuf {
    let mut parts: Vec<Utf8Component> = Vec::new();
    for part in path.as_ref().components() {
        match part {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => match parts.last() {
                Some(Utf8Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Utf8Component::RootDir) | Some(Utf8Component::Prefix(_)) => {}
                _ => parts.push(part),
            },
            _ => parts.push(part),
        }
    }
    if parts.is_empty() {
        return Utf8PathBuf::from(".");
    }
    parts.iter().collect()
}

/// Splits the dirname and basename of the path if possible to do so
fn split(path: &Utf8Path) -> Option<(&Utf8Path, &str)> {
    path.as_str().rsplit_once('/').map(|(parent, child)| {
        if parent.is_empty() {
            ("/".into(), child)
        } else {
            (parent.into(), child)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_paths() {
        assert_eq!(normalize("/a/./b/../c"), "/a/c");
        assert_eq!(normalize("a/b/../../c"), "c");
        assert_eq!(normalize("../a/./b"), "../a/b");
        assert_eq!(normalize("/../a"), "/a");
        assert_eq!(normalize("./"), ".");
        assert_eq!(normalize("config//schema/core.schema.oks"), "config/schema/core.schema.oks");
    }

    #[test]
    fn split_paths() {
        assert_eq!(split("/a/b".into()), Some(("/a".into(), "b")));
        assert_eq!(split("/a".into()), Some(("/".into(), "a")));
        assert_eq!(split("a".into()), None);
    }
}
