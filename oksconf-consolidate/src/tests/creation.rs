use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use oksconf_config::{ConfigFile, FileConventions};
use oksconf_database::{Database, FileRef, OksDatabase};
use oksconf_storage::Storage;

use crate::{create_database, find_include};

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[test]
fn create_with_looked_up_includes() -> Result<()> {
    let (storage, mut config) = database_fixture! {
        search_path:
            "/share"
        files:
            "/share/schema/core.schema.oks" [":class Session\n"]
            "/share/schema/readout.schema.oks" [":class Readout\n"]
            "/share/data/hosts.data.oks" [""]
            "/share/data/hosts-extra.data.oks" [""]
            "/work/local.data.oks" [""]
    };
    config.apply(
        ConfigFile::try_from("default_includes = [\"schema/core.schema.oks\"]")?,
        Utf8Path::new("/etc"),
    );

    let output = create_database(
        &storage,
        "/work/new",
        &names(&["readout", "hosts.data", "local.data.oks"]),
        &config,
    )?;
    assert_eq!(output, "/work/new.data.oks");
    assert_eq!(
        storage.read_file(&output)?,
        indoc::indoc!(
            "
            :include schema/core.schema.oks
            :include schema/readout.schema.oks
            :include data/hosts.data.oks
            :include local.data.oks
            "
        )
    );

    let db = OksDatabase::open(&storage, &output, config.search_path())?;
    assert_eq!(
        db.includes(&FileRef::Root)?,
        vec![
            "/share/schema/core.schema.oks",
            "/share/schema/readout.schema.oks",
            "/share/data/hosts.data.oks",
            "/work/local.data.oks",
        ]
    );
    Ok(())
}

#[test]
fn create_keeps_data_file_names() -> Result<()> {
    let (storage, config) = database_fixture! {
        files:
            "/work/core.schema.oks" [":class Session\n"]
    };
    let output = create_database(
        &storage,
        "/work/sessions.data.oks",
        &names(&["core.schema"]),
        &config,
    )?;
    assert_eq!(output, "/work/sessions.data.oks");
    assert_eq!(storage.read_file(&output)?, ":include core.schema.oks\n");
    Ok(())
}

#[test]
fn create_fails_on_unknown_names() -> Result<()> {
    let (storage, config) = database_fixture! {
        files:
            "/work/core.schema.oks" [":class Session\n"]
    };
    let result = create_database(&storage, "/work/new", &names(&["core", "missing"]), &config);
    assert!(result.is_err());
    assert!(!storage.exists("/work/new.data.oks"));
    Ok(())
}

#[test]
fn prefix_names_match_several_files() -> Result<()> {
    let (storage, _config) = database_fixture! {
        files:
            "/one/data/hosts.data.oks" [""]
            "/one/data/hosts-extra.data.oks" [""]
            "/one/data/other.data.oks" [""]
            "/two/hosts.data.oks" [""]
            "/two/nested/dir/hosts.data.oks" [""]
    };
    let conventions = FileConventions::default();
    let directories: Vec<Utf8PathBuf> = vec!["/one".into(), "/two".into()];

    let (directory, found) = find_include(&storage, "hosts", &directories, &conventions)?;
    assert_eq!(directory.as_str(), "/one");
    assert_eq!(found, vec!["data/hosts-extra.data.oks", "data/hosts.data.oks"]);

    let (directory, found) = find_include(&storage, "hosts.data.oks", &directories, &conventions)?;
    assert_eq!(directory.as_str(), "/one");
    assert_eq!(found, vec!["data/hosts.data.oks"]);

    let (directory, found) = find_include(&storage, "nested/dir/hosts", &directories, &conventions)?;
    assert_eq!(directory.as_str(), "/two");
    assert_eq!(found, vec!["nested/dir/hosts.data.oks"]);

    assert!(find_include(&storage, "hosts.schema", &directories, &conventions).is_err());
    Ok(())
}

#[test]
fn search_path_wins_over_output_directory() -> Result<()> {
    let (storage, config) = database_fixture! {
        search_path:
            "/share"
        files:
            "/share/schema/core.schema.oks" [":class Host\n"]
            "/share/data/hosts.data.oks" [":include schema/core.schema.oks\nHost shared\n"]
            "/work/data/hosts.data.oks" [":include ../../share/schema/core.schema.oks\nHost local\n"]
            "/work/local.data.oks" [""]
    };
    let output = create_database(
        &storage,
        "/work/new",
        &names(&["hosts.data", "core.schema", "local"]),
        &config,
    )?;
    assert_eq!(
        storage.read_file(&output)?,
        indoc::indoc!(
            "
            :include /share/data/hosts.data.oks
            :include schema/core.schema.oks
            :include local.data.oks
            "
        )
    );

    let db = OksDatabase::open(&storage, &output, config.search_path())?;
    assert_eq!(
        db.includes(&FileRef::Root)?,
        vec![
            "/share/data/hosts.data.oks",
            "/share/schema/core.schema.oks",
            "/work/local.data.oks",
        ]
    );
    assert!(db.get("Host", "shared").is_ok());
    assert!(db.get("Host", "local").is_err());
    Ok(())
}
