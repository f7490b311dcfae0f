use std::{collections::BTreeSet, fmt::Display};

use anyhow::{bail, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use oksconf_config::{Config, IncludePolicy, OnDuplicate};
use oksconf_dal::{DalObject, Identity};
use oksconf_database::{Database, FileRef, OksDatabase};
use oksconf_storage::{normalize, Storage};
use tracing::{debug, info, warn};

use crate::{resolve_includes, schema_files};

/// The outcome of a consolidation or merge
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Number of input databases fully processed
    pub inputs: usize,
    /// Objects added to the output
    pub copied: usize,
    /// Objects left out because the output already had their identity
    pub skipped: usize,
    /// Objects that replaced one of the same identity in the output
    pub overwritten: usize,
    /// Relationships of the output whose target is not in the output
    pub dangling: Vec<DanglingReference>,
}

impl Display for MergeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} input(s): {} copied, {} skipped, {} overwritten, {} dangling reference(s)",
            self.inputs,
            self.copied,
            self.skipped,
            self.overwritten,
            self.dangling.len()
        )
    }
}

/// A relationship whose target cannot be found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub source: Identity,
    pub field: String,
    pub target: Identity,
}

impl Display for DanglingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} -> {}", self.source, self.field, self.target)
    }
}

/// Rewrites a database and everything it includes into a single new data file
///
/// The output includes exactly the schema files of the source's include closure; the objects
/// of every included data file are copied into the output itself.
pub fn consolidate_db<S: Storage>(
    storage: &S,
    source: impl AsRef<Utf8Path>,
    output: impl AsRef<Utf8Path>,
    config: &Config,
) -> Result<MergeReport> {
    let (source, output) = (normalize(source), normalize(output));
    if source == output {
        bail!("Cannot consolidate {source} into itself");
    }

    info!("Reading database {source}");
    let db = OksDatabase::open(storage, &source, config.search_path())?;
    let includes = resolve_includes(&db, &FileRef::Root, config.conventions())?;
    let schemas = schema_files(&includes, config.conventions());
    info!("Included schemas: {}", join(&schemas));

    info!("Creating new database {output}");
    let mut new_db = OksDatabase::create(storage, &output, schemas, config.search_path())?;
    carry_classes(&mut new_db, std::slice::from_ref(&db), config)?;
    new_db.commit()?;

    let mut report = MergeReport::default();
    let objects = db.objects()?;
    info!("Copying {} objects to {output}", objects.len());
    for object in objects.into_values() {
        let object = load(&db, object)?;
        debug!("Copying object {}", object.identity());
        let identity = object.identity().clone();
        new_db
            .add_object(object)
            .with_context(|| format!("Copying {identity} into {output}"))?;
        report.copied += 1;
    }
    report.inputs = 1;
    report.dangling = dangling_references(&new_db)?;

    info!("Saving database {output}");
    new_db.commit()?;
    Ok(report)
}

/// Merges several databases into a new data file
///
/// The includes of the output are chosen by the configured [`IncludePolicy`], and identities
/// already present in the output are handled according to the configured [`OnDuplicate`].
/// The output is committed after each input, so a failure leaves the work of earlier inputs
/// in place.
pub fn consolidate_files<S: Storage>(
    storage: &S,
    output: impl AsRef<Utf8Path>,
    inputs: &[Utf8PathBuf],
    config: &Config,
) -> Result<MergeReport> {
    let output = normalize(output);
    if inputs.is_empty() {
        bail!("No input databases given to merge into {output}");
    }
    info!(
        "Consolidating {} databases into output database {output}",
        inputs.len()
    );

    let dbs = open_inputs(storage, &output, inputs, config)?;
    let includes = output_includes(&dbs, &output, config)?;
    info!("Included files: {}", join(&includes));

    let mut new_db = OksDatabase::create(storage, &output, includes, config.search_path())?;
    carry_classes(&mut new_db, &dbs, config)?;
    new_db.commit()?;

    let report = copy_objects(&mut new_db, &dbs, config.on_duplicate())?;
    info!("Saving database {output}");
    new_db.commit()?;
    Ok(report)
}

/// Merges databases into an already open output
///
/// Includes the configured [`IncludePolicy`] calls for are added to the output first, when it
/// does not already include them. Merging the same inputs a second time with
/// [`OnDuplicate::Skip`] copies nothing.
pub fn merge_into<O: Database, D: Database>(
    output: &mut O,
    inputs: &[D],
    config: &Config,
) -> Result<MergeReport> {
    let root = output.root().to_owned();
    let present: BTreeSet<Utf8PathBuf> = output.includes(&FileRef::Root)?.into_iter().collect();
    for include in output_includes(inputs, &root, config)? {
        if !present.contains(&include) {
            info!("Adding include {include} to {root}");
            output.add_include(&include)?;
        }
    }
    carry_classes(output, inputs, config)?;
    output.commit()?;

    let report = copy_objects(output, inputs, config.on_duplicate())?;
    info!("Saving database {root}");
    output.commit()?;
    Ok(report)
}

/// Opens each input database, refusing any that is the output itself
fn open_inputs<'s, S: Storage>(
    storage: &'s S,
    output: &Utf8Path,
    inputs: &[Utf8PathBuf],
    config: &Config,
) -> Result<Vec<OksDatabase<'s, S>>> {
    inputs
        .iter()
        .map(|input| {
            if normalize(input) == output {
                bail!("Cannot merge {output} into itself");
            }
            info!("Reading database {input}");
            Ok(OksDatabase::open(storage, input, config.search_path())?)
        })
        .collect()
}

/// The files an output merged from `inputs` should include
fn output_includes<D: Database>(
    inputs: &[D],
    output: &Utf8Path,
    config: &Config,
) -> Result<Vec<Utf8PathBuf>> {
    let mut union = BTreeSet::new();
    for db in inputs {
        debug!("Resolving includes of {}", db.root());
        union.extend(resolve_includes(db, &FileRef::Root, config.conventions())?);
    }
    Ok(match config.include_policy() {
        IncludePolicy::SchemaOnly => schema_files(&union, config.conventions()),
        IncludePolicy::PreserveDependencies => {
            let excluded: BTreeSet<&Utf8Path> = inputs
                .iter()
                .map(|db| db.root())
                .chain(std::iter::once(output))
                .collect();
            union
                .into_iter()
                .filter(|path| !excluded.contains(path.as_path()))
                .collect()
        }
    })
}

/// Declares in the output every class declared by a file of the inputs
///
/// Schema files reach the output through its includes, but the classes a data file declares
/// for itself would be lost when its objects are flattened into the output. Classes the output
/// already declares are left alone.
fn carry_classes<O: Database, D: Database>(
    output: &mut O,
    inputs: &[D],
    config: &Config,
) -> Result<()> {
    for db in inputs {
        let files = std::iter::once(db.root().to_owned())
            .chain(resolve_includes(db, &FileRef::Root, config.conventions())?);
        for path in files {
            for class in db.declared_classes(&FileRef::Named(path.clone()))? {
                let name = class.name.clone();
                if output.add_class(class)? {
                    info!("Declaring class {name} of {path} in {}", output.root());
                }
            }
        }
    }
    Ok(())
}

fn copy_objects<O: Database, D: Database>(
    output: &mut O,
    inputs: &[D],
    on_duplicate: OnDuplicate,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();
    for db in inputs {
        let objects = db.objects()?;
        info!("Copying {} objects from {}", objects.len(), db.root());
        for object in objects.into_values() {
            let object = load(db, object)?;
            copy_object(output, object, on_duplicate, &mut report)?;
        }
        output.commit()?;
        report.inputs += 1;
    }
    if report.skipped > 0 {
        warn!(
            "Skipped {} objects already present in {}",
            report.skipped,
            output.root()
        );
    }
    report.dangling = dangling_references(output)?;
    info!("{report}");
    Ok(report)
}

fn copy_object(
    output: &mut impl Database,
    object: DalObject,
    on_duplicate: OnDuplicate,
    report: &mut MergeReport,
) -> Result<()> {
    let identity = object.identity().clone();
    let root = output.root().to_owned();
    let context = || format!("Copying {identity} into {root}");
    match on_duplicate {
        OnDuplicate::Skip => {
            if output.contains(&identity)? {
                debug!("Skipping {identity}, already present");
                report.skipped += 1;
            } else {
                debug!("Copying object {identity}");
                output.add_object(object).with_context(context)?;
                report.copied += 1;
            }
        }
        OnDuplicate::Overwrite => {
            if output.contains(&identity)? {
                debug!("Overwriting object {identity}");
                report.overwritten += 1;
            } else {
                debug!("Copying object {identity}");
                report.copied += 1;
            }
            output.update_object(object).with_context(context)?;
        }
        OnDuplicate::Fail => {
            debug!("Copying object {identity}");
            output.add_object(object).with_context(context)?;
            report.copied += 1;
        }
    }
    Ok(())
}

/// Fetches an object through the database before copying, so it is copied fully loaded
fn load(db: &impl Database, object: &DalObject) -> Result<DalObject> {
    debug!("Loading object {} into cache", object.identity());
    Ok(db.get(object.class(), object.id())?.clone())
}

/// Lists every relationship of the database whose target object does not exist in it
pub fn dangling_references(db: &impl Database) -> oksconf_database::Result<Vec<DanglingReference>> {
    let mut dangling = Vec::new();
    for object in db.objects()?.into_values() {
        for (field, target) in object.relationships() {
            match db.get(&target.class, &target.id) {
                Ok(_) => (),
                Err(e) if e.is_not_found() => {
                    let reference = DanglingReference {
                        source: object.identity().clone(),
                        field: field.to_owned(),
                        target: target.clone(),
                    };
                    warn!("Dangling reference {reference} in {}", db.root());
                    dangling.push(reference);
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(dangling)
}

fn join(paths: &[Utf8PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
