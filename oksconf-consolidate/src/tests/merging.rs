use anyhow::Result;
use camino::Utf8PathBuf;
use oksconf_config::{IncludePolicy, OnDuplicate};
use oksconf_dal::{Field, Identity, Value};
use oksconf_database::{Database, DbError, FileRef, OksDatabase};
use oksconf_storage::Storage;

use super::identities;
use crate::{consolidate_db, consolidate_files, merge_into, DanglingReference};

fn inputs(paths: &[&str]) -> Vec<Utf8PathBuf> {
    paths.iter().map(|path| Utf8PathBuf::from(*path)).collect()
}

#[test]
fn consolidate_single_database() -> Result<()> {
    let (storage, config) = database_fixture! {
        files:
            "/db/core.schema.oks" [":class Widget\n"]
            "/db/widgets.data.oks" ["
                :include core.schema.oks

                Widget w1
                    name = \"first\"
                    next -> Widget@w2

                Widget w2
                    name = \"second\"
                "]
    };
    let report = consolidate_db(
        &storage,
        "/db/widgets.data.oks",
        "/out/flat.data.oks",
        &config,
    )?;
    assert_eq!(report.inputs, 1);
    assert_eq!(report.copied, 2);
    assert!(report.dangling.is_empty());

    let source = OksDatabase::open(&storage, "/db/widgets.data.oks", config.search_path())?;
    let output = OksDatabase::open(&storage, "/out/flat.data.oks", config.search_path())?;
    assert_eq!(identities(&output)?, vec!["Widget@w1", "Widget@w2"]);
    assert_eq!(
        output.includes(&FileRef::Root)?,
        source.includes(&FileRef::Root)?
    );
    for (identity, object) in source.objects()? {
        assert_eq!(output.get(&identity.class, &identity.id)?, object);
    }

    assert_eq!(
        storage.read_file("/out/flat.data.oks")?,
        indoc::indoc!(
            "
            :include /db/core.schema.oks

            Widget w1
                name = \"first\"
                next -> Widget@w2

            Widget w2
                name = \"second\"
            "
        )
    );
    Ok(())
}

#[test]
fn consolidate_flattens_included_data() -> Result<()> {
    let (storage, config) = database_fixture! {
        files:
            "/db/schema/core.schema.oks" [":class Host\n:class Sensor\n"]
            "/db/hosts.data.oks" ["
                :include schema/core.schema.oks

                Host h1
                    cores = 16
                "]
            "/db/top.data.oks" ["
                :include hosts.data.oks

                Sensor s1
                    host -> Host@h1
                "]
    };
    consolidate_db(&storage, "/db/top.data.oks", "/db/flat.data.oks", &config)?;

    let output = OksDatabase::open(&storage, "/db/flat.data.oks", config.search_path())?;
    assert_eq!(
        output.includes(&FileRef::Root)?,
        vec!["/db/schema/core.schema.oks"]
    );
    assert_eq!(identities(&output)?, vec!["Host@h1", "Sensor@s1"]);
    assert_eq!(
        output.get("Host", "h1")?.get("cores"),
        Some(&Field::Scalar(Value::Integer(16)))
    );
    Ok(())
}

#[test]
fn consolidate_refuses_to_overwrite_source() -> Result<()> {
    let (storage, config) = database_fixture! {
        files:
            "/db/top.data.oks" [""]
    };
    assert!(consolidate_db(&storage, "/db/top.data.oks", "/db/./top.data.oks", &config).is_err());
    assert_eq!(storage.read_file("/db/top.data.oks")?, "");
    Ok(())
}

#[test]
fn merge_keeps_first_writer() -> Result<()> {
    let (storage, config) = database_fixture! {
        files:
            "/db/core.schema.oks" [":class ResourceBase\n:class Sensor : ResourceBase\n"]
            "/db/first.data.oks" ["
                :include core.schema.oks

                Sensor s1
                    rate = 10
                "]
            "/db/second.data.oks" ["
                :include core.schema.oks

                Sensor s1
                    rate = 20

                Sensor s2
                    rate = 30
                "]
    };
    let report = consolidate_files(
        &storage,
        "/db/merged.data.oks",
        &inputs(&["/db/first.data.oks", "/db/second.data.oks"]),
        &config,
    )?;
    assert_eq!(report.inputs, 2);
    assert_eq!(report.copied, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.overwritten, 0);

    let output = OksDatabase::open(&storage, "/db/merged.data.oks", config.search_path())?;
    assert_eq!(identities(&output)?, vec!["Sensor@s1", "Sensor@s2"]);
    assert_eq!(
        output.get("Sensor", "s1")?.get("rate"),
        Some(&Field::Scalar(Value::Integer(10)))
    );
    assert_eq!(
        output.includes(&FileRef::Root)?,
        vec!["/db/core.schema.oks"]
    );
    Ok(())
}

#[test]
fn merging_again_adds_nothing() -> Result<()> {
    let (storage, config) = database_fixture! {
        files:
            "/db/core.schema.oks" [":class Sensor\n"]
            "/db/first.data.oks" [":include core.schema.oks\nSensor s1\n    rate = 10\n"]
            "/db/second.data.oks" [":include core.schema.oks\nSensor s2\n    rate = 20\n"]
    };
    let sources = inputs(&["/db/first.data.oks", "/db/second.data.oks"]);
    consolidate_files(&storage, "/db/merged.data.oks", &sources, &config)?;
    let merged = storage.read_file("/db/merged.data.oks")?;

    let dbs = sources
        .iter()
        .map(|path| OksDatabase::open(&storage, path, config.search_path()))
        .collect::<Result<Vec<_>, _>>()?;
    let mut output = OksDatabase::open(&storage, "/db/merged.data.oks", config.search_path())?;
    let report = merge_into(&mut output, &dbs, &config)?;

    assert_eq!(report.inputs, 2);
    assert_eq!(report.copied, 0);
    assert_eq!(report.skipped, 2);
    assert!(!output.is_modified());
    assert_eq!(storage.read_file("/db/merged.data.oks")?, merged);
    Ok(())
}

#[test]
fn merge_into_existing_output_adds_includes() -> Result<()> {
    let (storage, config) = database_fixture! {
        files:
            "/db/core.schema.oks" [":class Sensor\n"]
            "/db/extra.schema.oks" [":class Gadget\n"]
            "/db/output.data.oks" [":include core.schema.oks\nSensor s1\n"]
            "/db/input.data.oks" ["
                :include core.schema.oks
                :include extra.schema.oks

                Gadget g1
                Sensor s1
                "]
    };
    let mut output = OksDatabase::open(&storage, "/db/output.data.oks", config.search_path())?;
    let input = OksDatabase::open(&storage, "/db/input.data.oks", config.search_path())?;
    let report = merge_into(&mut output, &[input], &config)?;
    assert_eq!(report.copied, 1);
    assert_eq!(report.skipped, 1);

    assert_eq!(
        storage.read_file("/db/output.data.oks")?,
        indoc::indoc!(
            "
            :include core.schema.oks
            :include /db/extra.schema.oks

            Gadget g1

            Sensor s1
            "
        )
    );
    Ok(())
}

#[test]
fn merge_can_overwrite() -> Result<()> {
    let (storage, mut config) = database_fixture! {
        files:
            "/db/core.schema.oks" [":class Sensor\n"]
            "/db/first.data.oks" [":include core.schema.oks\nSensor s1\n    rate = 10\n"]
            "/db/second.data.oks" [":include core.schema.oks\nSensor s1\n    rate = 20\nSensor s2\n"]
    };
    config.set_on_duplicate(OnDuplicate::Overwrite);
    let report = consolidate_files(
        &storage,
        "/db/merged.data.oks",
        &inputs(&["/db/first.data.oks", "/db/second.data.oks"]),
        &config,
    )?;
    assert_eq!(report.copied, 2);
    assert_eq!(report.overwritten, 1);
    assert_eq!(report.skipped, 0);

    let output = OksDatabase::open(&storage, "/db/merged.data.oks", config.search_path())?;
    assert_eq!(
        output.get("Sensor", "s1")?.get("rate"),
        Some(&Field::Scalar(Value::Integer(20)))
    );
    Ok(())
}

#[test]
fn merge_can_fail_on_duplicates() -> Result<()> {
    let (storage, mut config) = database_fixture! {
        files:
            "/db/core.schema.oks" [":class Sensor\n"]
            "/db/first.data.oks" [":include core.schema.oks\nSensor s1\n    rate = 10\n"]
            "/db/second.data.oks" [":include core.schema.oks\nSensor s1\n    rate = 20\n"]
    };
    config.set_on_duplicate(OnDuplicate::Fail);
    let err = consolidate_files(
        &storage,
        "/db/merged.data.oks",
        &inputs(&["/db/first.data.oks", "/db/second.data.oks"]),
        &config,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::DuplicateIdentity { identity, .. }) if identity == &Identity::new("Sensor", "s1")
    ));

    // The first input was committed before the failure
    let output = OksDatabase::open(&storage, "/db/merged.data.oks", config.search_path())?;
    assert_eq!(
        output.get("Sensor", "s1")?.get("rate"),
        Some(&Field::Scalar(Value::Integer(10)))
    );
    Ok(())
}

#[test]
fn merge_can_preserve_dependencies() -> Result<()> {
    let (storage, mut config) = database_fixture! {
        files:
            "/db/core.schema.oks" [":class Host\n:class Sensor\n"]
            "/db/hosts.data.oks" [":include core.schema.oks\nHost h1\n"]
            "/db/first.data.oks" [":include hosts.data.oks\nSensor s1\n    host -> Host@h1\n"]
            "/db/second.data.oks" [":include first.data.oks\nSensor s2\n"]
    };
    config.set_include_policy(IncludePolicy::PreserveDependencies);
    let report = consolidate_files(
        &storage,
        "/db/merged.data.oks",
        &inputs(&["/db/first.data.oks", "/db/second.data.oks"]),
        &config,
    )?;
    // Objects of the preserved include are already present
    assert_eq!(report.copied, 2);
    assert_eq!(report.skipped, 3);

    let output = OksDatabase::open(&storage, "/db/merged.data.oks", config.search_path())?;
    assert_eq!(
        output.includes(&FileRef::Root)?,
        vec!["/db/core.schema.oks", "/db/hosts.data.oks"]
    );
    assert_eq!(identities(&output)?, vec!["Host@h1", "Sensor@s1", "Sensor@s2"]);
    assert!(!storage.read_file("/db/merged.data.oks")?.contains("Host h1"));
    Ok(())
}

#[test]
fn merge_reports_dangling_references() -> Result<()> {
    let (storage, config) = database_fixture! {
        files:
            "/db/core.schema.oks" [":class Widget\n"]
            "/db/in.data.oks" ["
                :include core.schema.oks

                Widget w1
                    next -> Widget@w2
                    others -> [Widget@w1, Widget@gone]

                Widget w2
                "]
    };
    let report = consolidate_files(
        &storage,
        "/db/out.data.oks",
        &inputs(&["/db/in.data.oks"]),
        &config,
    )?;
    assert_eq!(
        report.dangling,
        vec![DanglingReference {
            source: Identity::new("Widget", "w1"),
            field: "others".into(),
            target: Identity::new("Widget", "gone"),
        }]
    );
    Ok(())
}

#[test]
fn merge_needs_inputs() -> Result<()> {
    let (storage, config) = database_fixture! {
        files:
            "/db/in.data.oks" [""]
    };
    assert!(consolidate_files(&storage, "/db/out.data.oks", &[], &config).is_err());
    assert!(consolidate_files(
        &storage,
        "/db/in.data.oks",
        &inputs(&["/db/in.data.oks"]),
        &config
    )
    .is_err());
    assert!(!storage.exists("/db/out.data.oks"));
    Ok(())
}

#[test]
fn consolidate_keeps_classes_declared_by_data_files() -> Result<()> {
    let (storage, config) = database_fixture! {
        files:
            "/db/widgets.data.oks" ["
                :include extra.data.oks
                :class Widget

                Widget w1
                "]
            "/db/extra.data.oks" ["
                :class Gadget : Widget

                Gadget g1
                "]
    };
    let report = consolidate_db(
        &storage,
        "/db/widgets.data.oks",
        "/out/flat.data.oks",
        &config,
    )?;
    assert_eq!(report.copied, 2);
    assert_eq!(
        storage.read_file("/out/flat.data.oks")?,
        ":class Widget\n:class Gadget : Widget\n\nGadget g1\n\nWidget w1\n"
    );

    let output = OksDatabase::open(&storage, "/out/flat.data.oks", config.search_path())?;
    assert_eq!(identities(&output)?, vec!["Gadget@g1", "Widget@w1"]);
    assert!(output.is_a("Gadget", "Widget")?);
    Ok(())
}

#[test]
fn merge_keeps_classes_declared_by_inputs() -> Result<()> {
    let (storage, config) = database_fixture! {
        files:
            "/db/core.schema.oks" [":class Widget\n"]
            "/db/first.data.oks" [":include core.schema.oks\n:class Local : Widget\nLocal l1\n"]
            "/db/second.data.oks" [":class Widget\n:class Sensor\nSensor s1\n"]
    };
    let report = consolidate_files(
        &storage,
        "/db/merged.data.oks",
        &inputs(&["/db/first.data.oks", "/db/second.data.oks"]),
        &config,
    )?;
    assert_eq!(report.copied, 2);

    let output = OksDatabase::open(&storage, "/db/merged.data.oks", config.search_path())?;
    assert_eq!(identities(&output)?, vec!["Local@l1", "Sensor@s1"]);
    // Widget comes from the included schema, so it is not declared again
    assert_eq!(
        storage.read_file("/db/merged.data.oks")?,
        indoc::indoc!(
            "
            :include /db/core.schema.oks

            :class Local : Widget
            :class Sensor

            Local l1

            Sensor s1
            "
        )
    );
    Ok(())
}

#[test]
fn consolidated_output_reopens_with_spaces_in_schema_path() -> Result<()> {
    let (storage, config) = database_fixture! {
        search_path:
            "/my db"
        files:
            "/my db/core.schema.oks" [":class Widget\n"]
            "/db/widgets.data.oks" [":include core.schema.oks\nWidget w1\n"]
    };
    let report = consolidate_db(
        &storage,
        "/db/widgets.data.oks",
        "/out/flat.data.oks",
        &config,
    )?;
    assert_eq!(report.copied, 1);

    let output = OksDatabase::open(&storage, "/out/flat.data.oks", config.search_path())?;
    assert_eq!(
        output.includes(&FileRef::Root)?,
        vec!["/my db/core.schema.oks"]
    );
    assert_eq!(identities(&output)?, vec!["Widget@w1"]);
    Ok(())
}
