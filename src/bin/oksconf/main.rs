#![doc = include_str!("../../../README.md")]

use anyhow::{bail, Result};
use camino::Utf8Path;
use clap::Parser;
use tracing::{span, Level};

mod args;
use args::{Command, CommandLineArgs};
use oksconf_config::{Config, SEARCH_PATH_VARIABLE};
use oksconf_consolidate::{self as consolidate, MergeReport};
use oksconf_database::{Database, FileRef, OksDatabase};
use oksconf_storage::{normalize, DiskStorage, Storage};

const DEFAULT_CONFIG_FILE: &str = "oksconf.toml";

fn init_logger(verbosity: u8) {
    let sub = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_file(false)
        .with_line_number(false);
    let (level, pretty) = match verbosity {
        0 => (Level::WARN, false),
        1 => (Level::INFO, false),
        2 => (Level::INFO, true),
        3 => (Level::DEBUG, true),
        _ => (Level::TRACE, true),
    };
    let sub = sub.with_max_level(level);
    if pretty {
        sub.pretty().init();
    } else {
        sub.init();
    }
}

fn main() -> Result<()> {
    let CommandLineArgs {
        config_file,
        verbose,
        command,
    } = CommandLineArgs::parse();

    init_logger(verbose);
    let span = span!(Level::DEBUG, "main", command = command.name());
    let _guard = span.enter();

    let mut config = Config::new();
    match config_file {
        Some(path) => config.load(path)?,
        None if Utf8Path::new(DEFAULT_CONFIG_FILE).is_file() => config.load(DEFAULT_CONFIG_FILE)?,
        None => tracing::debug!("No {DEFAULT_CONFIG_FILE} found, using defaults"),
    }
    if let Ok(path_list) = std::env::var(SEARCH_PATH_VARIABLE) {
        config.extend_search_path(&path_list);
    }

    let storage = DiskStorage::new();
    match command {
        Command::Consolidate {
            source,
            output,
            force,
        } => {
            check_output(&storage, &output, force)?;
            let report = consolidate::consolidate_db(&storage, &source, &output, &config)?;
            print_report(&report);
        }
        Command::Merge {
            output,
            inputs,
            on_duplicate,
            include_policy,
            append,
            force,
        } => {
            if let Some(on_duplicate) = on_duplicate {
                config.set_on_duplicate(on_duplicate);
            }
            if let Some(include_policy) = include_policy {
                config.set_include_policy(include_policy);
            }
            let report = if append {
                let mut output_db = OksDatabase::open(&storage, &output, config.search_path())?;
                let mut dbs = Vec::with_capacity(inputs.len());
                for input in &inputs {
                    if normalize(input) == output_db.root() {
                        bail!("Cannot merge {output} into itself");
                    }
                    dbs.push(OksDatabase::open(&storage, input, config.search_path())?);
                }
                consolidate::merge_into(&mut output_db, &dbs, &config)?
            } else {
                check_output(&storage, &output, force)?;
                consolidate::consolidate_files(&storage, &output, &inputs, &config)?
            };
            print_report(&report);
        }
        Command::Includes {
            database,
            file,
            schema_only,
        } => {
            let db = OksDatabase::open(&storage, &database, config.search_path())?;
            let start = file.map(FileRef::Named).unwrap_or(FileRef::Root);
            let includes = consolidate::resolve_includes(&db, &start, config.conventions())?;
            let includes = if schema_only {
                consolidate::schema_files(&includes, config.conventions())
            } else {
                includes.into_iter().collect()
            };
            for include in includes {
                println!("{include}");
            }
        }
        Command::Create {
            output,
            includes,
            force,
        } => {
            let output = consolidate::data_file_name(&output, config.conventions());
            check_output(&storage, &output, force)?;
            let output = consolidate::create_database(&storage, &output, &includes, &config)?;
            println!("Created {output}");
        }
        Command::Enable {
            database,
            resources,
            session,
        } => set_enabled(&storage, &database, &resources, session, true, &config)?,
        Command::Disable {
            database,
            resources,
            session,
        } => set_enabled(&storage, &database, &resources, session, false, &config)?,
        Command::Apps { database, session } => {
            let db = OksDatabase::open(&storage, &database, config.search_path())?;
            match session {
                Some(session) => {
                    for app in consolidate::session_apps(&db, &config, Some(&session))? {
                        println!("{app}");
                    }
                }
                None => {
                    for (session, apps) in consolidate::database_apps(&db, &config)? {
                        println!("{session}: {}", apps.join(" "));
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_output(storage: &impl Storage, output: &Utf8Path, force: bool) -> Result<()> {
    if storage.exists(output) && !force {
        bail!("{output} already exists (use --force to replace it)");
    }
    Ok(())
}

fn set_enabled(
    storage: &DiskStorage,
    database: &Utf8Path,
    resources: &[String],
    session: Option<String>,
    enabled: bool,
    config: &Config,
) -> Result<()> {
    let mut db = OksDatabase::open(storage, database, config.search_path())?;
    let report = consolidate::set_enabled(&mut db, config, session.as_deref(), resources, enabled)?;
    let state = if enabled { "enabled" } else { "disabled" };
    println!(
        "Session {}: {} {state}, {} unchanged, {} not found",
        report.session,
        report.changed.len(),
        report.unchanged.len(),
        report.missing.len()
    );
    Ok(())
}

fn print_report(report: &MergeReport) {
    println!("{report}");
    for reference in &report.dangling {
        println!("  dangling: {reference}");
    }
}
