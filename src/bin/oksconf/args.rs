use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use oksconf_config::{IncludePolicy, OnDuplicate};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineArgs {
    /// The path to the oksconf.toml config file (by default, oksconf.toml is read if present)
    #[arg(short, long)]
    pub config_file: Option<Utf8PathBuf>,

    /// Increase logging verbosity level (0: warn; 1: info; 2: info, pretty; 3: debug; 4: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rewrite a database and everything it includes into a single data file
    Consolidate {
        /// The database to read
        source: Utf8PathBuf,

        /// The data file to write
        output: Utf8PathBuf,

        /// Replace the output if it already exists
        #[arg(long)]
        force: bool,
    },

    /// Merge the objects of several databases into one data file
    Merge {
        /// The data file to write
        output: Utf8PathBuf,

        /// The databases to merge, in order of precedence
        #[arg(required = true)]
        inputs: Vec<Utf8PathBuf>,

        /// What to do with objects already in the output: skip, overwrite or fail
        #[arg(long, value_parser = parse_on_duplicate)]
        on_duplicate: Option<OnDuplicate>,

        /// Which includes the output keeps: schema-only or preserve-dependencies
        #[arg(long, value_parser = parse_include_policy)]
        include_policy: Option<IncludePolicy>,

        /// Merge into the existing output instead of creating it
        #[arg(long, conflicts_with = "force")]
        append: bool,

        /// Replace the output if it already exists
        #[arg(long)]
        force: bool,
    },

    /// List the files a database includes, directly or through included data files
    Includes {
        /// The database to read
        database: Utf8PathBuf,

        /// Start from this file of the database instead of its top level file
        #[arg(long)]
        file: Option<Utf8PathBuf>,

        /// List schema files only
        #[arg(long)]
        schema_only: bool,
    },

    /// Create an empty database including the default includes and any others named
    Create {
        /// The data file to write (a data file suffix is added if missing)
        output: Utf8PathBuf,

        /// Include files matching this name, for example "hosts.data" or "readout"
        #[arg(short, long = "include")]
        includes: Vec<String>,

        /// Replace the output if it already exists
        #[arg(long)]
        force: bool,
    },

    /// Enable resources by removing them from a session's disabled list
    Enable {
        /// The database to modify
        database: Utf8PathBuf,

        /// Ids of the resources to enable
        #[arg(required = true)]
        resources: Vec<String>,

        /// The session to modify (by default, the first session)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Disable resources by adding them to a session's disabled list
    Disable {
        /// The database to modify
        database: Utf8PathBuf,

        /// Ids of the resources to disable
        #[arg(required = true)]
        resources: Vec<String>,

        /// The session to modify (by default, the first session)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// List the applications of a session, or of every session
    Apps {
        /// The database to read
        database: Utf8PathBuf,

        /// The session to list (by default, every session)
        #[arg(short, long)]
        session: Option<String>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Consolidate { .. } => "consolidate",
            Command::Merge { .. } => "merge",
            Command::Includes { .. } => "includes",
            Command::Create { .. } => "create",
            Command::Enable { .. } => "enable",
            Command::Disable { .. } => "disable",
            Command::Apps { .. } => "apps",
        }
    }
}

fn parse_on_duplicate(value: &str) -> Result<OnDuplicate> {
    value.parse()
}

fn parse_include_policy(value: &str) -> Result<IncludePolicy> {
    value.parse()
}
