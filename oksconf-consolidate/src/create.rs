use anyhow::{bail, Result};
use camino::{Utf8Path, Utf8PathBuf};
use oksconf_config::{Config, FileConventions};
use oksconf_database::{Database, OksDatabase};
use oksconf_storage::{normalize, Storage};
use regex::Regex;
use tracing::info;

const EXTENSION: &str = "oks";

/// Creates an empty database including the configured default includes and the files found for
/// each of `names`
///
/// See [`find_include`] for how names are looked up; the configured search path is searched
/// before the output's own directory. A name with no match is an error and nothing is written.
/// If the output's file name lacks the data marker, a data file suffix is appended.
///
/// Returns the path of the database written.
pub fn create_database<S: Storage>(
    storage: &S,
    output: impl AsRef<Utf8Path>,
    names: &[String],
    config: &Config,
) -> Result<Utf8PathBuf> {
    let conventions = config.conventions();
    let output = data_file_name(output, conventions);
    let output_dir = normalize(output.parent().unwrap_or_else(|| Utf8Path::new("")));

    let mut directories = config.search_path().to_vec();
    directories.push(output_dir.clone());

    let mut includes = config.default_includes().to_vec();
    for name in names {
        let (directory, found) = find_include(storage, name, &directories, conventions)?;
        for include in found {
            // Relative includes resolve next to the output first, so a file found elsewhere
            // that is shadowed there is included by its full path
            let shadowed =
                directory != output_dir.as_path() && storage.is_file(output_dir.join(&include));
            let include = if shadowed {
                directory.join(include)
            } else {
                include
            };
            if !includes.contains(&include) {
                info!("Adding {include} to include list");
                includes.push(include);
            }
        }
    }

    info!("Creating OKS database file {output}");
    let mut db = OksDatabase::create(storage, &output, includes, config.search_path())?;
    db.commit()?;
    Ok(output)
}

/// Returns the path with a data file suffix appended, unless its name already has the data marker
pub fn data_file_name(path: impl AsRef<Utf8Path>, conventions: &FileConventions) -> Utf8PathBuf {
    let path = normalize(path);
    if conventions.is_data(&path) {
        path
    } else {
        format!("{path}{}{EXTENSION}", conventions.data_marker).into()
    }
}

/// Looks up the files an include name refers to
///
/// After dropping any `.oks` extension, a name ending in the data or schema marker (such as
/// `hosts.data`) must match a file name exactly; any other name matches every file name that
/// starts with it. Each directory is tried in turn, first directly and then under the
/// subdirectory for the name's kind (`data/` or `schema/`, or any subdirectory when the kind is
/// not known). Returns the first directory with any match, and all its matches relative to it.
pub fn find_include<'d, S: Storage>(
    storage: &S,
    name: &str,
    directories: &'d [Utf8PathBuf],
    conventions: &FileConventions,
) -> Result<(&'d Utf8Path, Vec<Utf8PathBuf>)> {
    let stem = name
        .strip_suffix(&format!(".{EXTENSION}"))
        .unwrap_or(name);
    let kind = [&conventions.data_marker, &conventions.schema_marker]
        .into_iter()
        .find(|marker| stem.ends_with(marker.trim_end_matches('.')))
        .map(|marker| marker.trim_matches('.'));

    let (relative_dir, file_stem) = match stem.rsplit_once('/') {
        Some((dir, file)) => (Utf8Path::new(dir), file),
        None => (Utf8Path::new(""), stem),
    };
    let wildcard = if kind.is_some() { "" } else { ".*" };
    let pattern = Regex::new(&format!(
        "^{}{wildcard}\\.{EXTENSION}$",
        regex::escape(file_stem)
    ))?;

    for directory in directories {
        let mut found = matches_in(storage, directory, relative_dir, &pattern)?;
        if found.is_empty() {
            let subdirectories = match kind {
                Some(kind) => vec![kind.to_owned()],
                None if storage.is_directory(directory) => storage
                    .list_directory(directory)?
                    .into_iter()
                    .filter(|entry| storage.is_directory(directory.join(entry)))
                    .collect(),
                None => Vec::new(),
            };
            for subdirectory in subdirectories {
                let relative = Utf8Path::new(&subdirectory).join(relative_dir);
                found.extend(matches_in(storage, directory, &relative, &pattern)?);
            }
        }
        if !found.is_empty() {
            tracing::debug!("Found {} match(es) for {name} in {directory}", found.len());
            return Ok((directory.as_path(), found));
        }
    }
    bail!("Could not find include file for {name}");
}

/// Lists the files of `directory/relative_dir` matching `pattern`, as paths relative to
/// `directory`
fn matches_in<S: Storage>(
    storage: &S,
    directory: &Utf8Path,
    relative_dir: &Utf8Path,
    pattern: &Regex,
) -> Result<Vec<Utf8PathBuf>> {
    let full = directory.join(relative_dir);
    if !storage.is_directory(&full) {
        return Ok(Vec::new());
    }
    Ok(storage
        .list_directory(&full)?
        .into_iter()
        .filter(|entry| pattern.is_match(entry) && storage.is_file(full.join(entry)))
        .map(|entry| relative_dir.join(entry))
        .collect())
}
