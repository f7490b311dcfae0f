use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};
use oksconf_config::FileConventions;
use oksconf_database::{Database, FileRef, Result};
use oksconf_storage::normalize;

/// Computes every file included by `start`, directly or through included data files
///
/// Only files whose names carry the data marker are followed; schema (and unmarked) files are
/// reported but not opened. The start file itself is never part of the result, even when an
/// include cycle leads back to it.
pub fn resolve_includes(
    db: &impl Database,
    start: &FileRef,
    conventions: &FileConventions,
) -> Result<BTreeSet<Utf8PathBuf>> {
    let start_path = match start {
        FileRef::Root => db.root().to_owned(),
        FileRef::Named(path) => normalize(path),
    };
    tracing::trace!("Resolving includes of {start_path}");

    let mut resolved = BTreeSet::new();
    let mut visited = BTreeSet::from([start_path.clone()]);
    let mut pending = vec![start.clone()];
    while let Some(file) = pending.pop() {
        for include in db.includes(&file)? {
            if include == start_path {
                continue;
            }
            if conventions.is_data(&include) && visited.insert(include.clone()) {
                pending.push(FileRef::Named(include.clone()));
            }
            resolved.insert(include);
        }
    }
    Ok(resolved)
}

/// Selects the schema files from a set of files, keeping their order
pub fn schema_files<'a>(
    files: impl IntoIterator<Item = &'a Utf8PathBuf>,
    conventions: &FileConventions,
) -> Vec<Utf8PathBuf> {
    files
        .into_iter()
        .map(Utf8PathBuf::as_path)
        .filter(|path| conventions.is_schema(path))
        .map(Utf8Path::to_owned)
        .collect()
}
