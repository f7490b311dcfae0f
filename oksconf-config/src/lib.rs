//! Configuration for the oksconf tools
//!
//! Example config file:
//! ```
//! # use oksconf_config::{ConfigFile, IncludePolicy, OnDuplicate};
//! # let config_text = r#"
//! search_path = ["/opt/oks/share", "config"]
//! default_includes = ["schema/core.schema.oks"]
//!
//! [conventions]
//! schema_marker = ".schema."
//! data_marker = ".data."
//!
//! [merge]
//! on_duplicate = "skip"
//! include_policy = "schema-only"
//!
//! [session]
//! session_class = "Session"
//! resource_class = "ResourceBase"
//! # "#;
//! # let config: ConfigFile = config_text.try_into().unwrap();
//! # let merge = config.merge.unwrap();
//! # assert_eq!(merge.on_duplicate, Some(OnDuplicate::Skip));
//! # assert_eq!(merge.include_policy, Some(IncludePolicy::SchemaOnly));
//! # assert_eq!(config.search_path.len(), 2);
//! ```
use std::{fmt::Display, str::FromStr};

use anyhow::{anyhow, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

mod file;
pub use file::{ConfigFile, ConfigMerge, ConfigSession};

/// Environment variable holding extra search path directories, separated by `:`
pub const SEARCH_PATH_VARIABLE: &str = "OKSCONF_PATH";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directories searched for relative include names
    search_path: Vec<Utf8PathBuf>,

    /// Includes added to every newly created database
    default_includes: Vec<Utf8PathBuf>,

    conventions: FileConventions,

    on_duplicate: OnDuplicate,

    include_policy: IncludePolicy,

    session_class: String,

    resource_class: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            search_path: Vec::new(),
            default_includes: Vec::new(),
            conventions: FileConventions::default(),
            on_duplicate: OnDuplicate::default(),
            include_policy: IncludePolicy::default(),
            session_class: "Session".into(),
            resource_class: "ResourceBase".into(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Default::default()
    }

    /// Applies the settings of a config file over the current ones
    pub fn load(&mut self, path: impl AsRef<Utf8Path>) -> Result<()> {
        let path = path.as_ref();
        tracing::debug!("Loading config {path}");
        let file = ConfigFile::load(path)?;
        let directory = path.parent().unwrap_or_else(|| Utf8Path::new(""));
        self.apply(file, directory);
        Ok(())
    }

    /// Applies the settings of an already parsed config file, with relative search path entries
    /// taken relative to `directory`
    pub fn apply(&mut self, file: ConfigFile, directory: &Utf8Path) {
        let ConfigFile {
            search_path,
            default_includes,
            conventions,
            merge,
            session,
        } = file;
        self.search_path.extend(search_path.into_iter().map(|dir| {
            if dir.is_absolute() {
                dir
            } else {
                directory.join(dir)
            }
        }));
        self.default_includes.extend(default_includes);
        if let Some(conventions) = conventions {
            self.conventions = conventions;
        }
        if let Some(ConfigMerge {
            on_duplicate,
            include_policy,
        }) = merge
        {
            self.on_duplicate = on_duplicate.unwrap_or(self.on_duplicate);
            self.include_policy = include_policy.unwrap_or(self.include_policy);
        }
        if let Some(ConfigSession {
            session_class,
            resource_class,
        }) = session
        {
            if let Some(class) = session_class {
                self.session_class = class;
            }
            if let Some(class) = resource_class {
                self.resource_class = class;
            }
        }
    }

    /// Appends the directories of a `:` separated path list (the value of
    /// [`SEARCH_PATH_VARIABLE`]) to the search path
    pub fn extend_search_path(&mut self, path_list: &str) {
        self.search_path.extend(
            path_list
                .split(':')
                .filter(|dir| !dir.is_empty())
                .map(Utf8PathBuf::from),
        );
    }

    pub fn set_on_duplicate(&mut self, on_duplicate: OnDuplicate) {
        self.on_duplicate = on_duplicate;
    }

    pub fn set_include_policy(&mut self, include_policy: IncludePolicy) {
        self.include_policy = include_policy;
    }

    pub fn set_session_class(&mut self, class: impl Into<String>) {
        self.session_class = class.into();
    }

    pub fn search_path(&self) -> &[Utf8PathBuf] {
        &self.search_path
    }

    pub fn default_includes(&self) -> &[Utf8PathBuf] {
        &self.default_includes
    }

    pub fn conventions(&self) -> &FileConventions {
        &self.conventions
    }

    pub fn on_duplicate(&self) -> OnDuplicate {
        self.on_duplicate
    }

    pub fn include_policy(&self) -> IncludePolicy {
        self.include_policy
    }

    /// The class of session objects
    pub fn session_class(&self) -> &str {
        &self.session_class
    }

    /// The base class of resources that a session may disable
    pub fn resource_class(&self) -> &str {
        &self.resource_class
    }
}

/// Substrings of file names that mark a file as schema or data
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct FileConventions {
    pub schema_marker: String,
    pub data_marker: String,
}

impl Default for FileConventions {
    fn default() -> Self {
        FileConventions {
            schema_marker: ".schema.".into(),
            data_marker: ".data.".into(),
        }
    }
}

impl FileConventions {
    /// Returns true if the file name marks a schema (type definition) file
    pub fn is_schema(&self, path: impl AsRef<Utf8Path>) -> bool {
        file_name(path.as_ref()).contains(&self.schema_marker)
    }

    /// Returns true if the file name marks a data (object instance) file
    pub fn is_data(&self, path: impl AsRef<Utf8Path>) -> bool {
        file_name(path.as_ref()).contains(&self.data_marker)
    }
}

fn file_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

/// What to do when a merged object's identity already exists in the output
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OnDuplicate {
    /// Keep the object already present (first writer wins)
    #[default]
    Skip,
    /// Replace the object already present (last writer wins)
    Overwrite,
    /// Abort the merge
    Fail,
}

impl FromStr for OnDuplicate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(OnDuplicate::Skip),
            "overwrite" => Ok(OnDuplicate::Overwrite),
            "fail" => Ok(OnDuplicate::Fail),
            _ => Err(anyhow!(
                "Unknown duplicate policy \"{s}\" (expected skip, overwrite or fail)"
            )),
        }
    }
}

impl Display for OnDuplicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OnDuplicate::Skip => "skip",
            OnDuplicate::Overwrite => "overwrite",
            OnDuplicate::Fail => "fail",
        })
    }
}

/// Which of the files included by the merge inputs the merged output includes
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IncludePolicy {
    /// Only schema files; all data is flattened into the output
    #[default]
    SchemaOnly,
    /// Every included file other than the inputs themselves
    PreserveDependencies,
}

impl FromStr for IncludePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "schema-only" => Ok(IncludePolicy::SchemaOnly),
            "preserve-dependencies" => Ok(IncludePolicy::PreserveDependencies),
            _ => Err(anyhow!(
                "Unknown include policy \"{s}\" (expected schema-only or preserve-dependencies)"
            )),
        }
    }
}

impl Display for IncludePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            IncludePolicy::SchemaOnly => "schema-only",
            IncludePolicy::PreserveDependencies => "preserve-dependencies",
        })
    }
}
