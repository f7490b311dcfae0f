use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::{FileConventions, IncludePolicy, OnDuplicate};

/// Deserialization of oksconf.toml
#[derive(Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Directories searched for relative include names (relative entries are taken relative
    /// to the config file's directory)
    #[serde(default)]
    pub search_path: Vec<Utf8PathBuf>,

    /// Includes added to every database made by `create`
    #[serde(default)]
    pub default_includes: Vec<Utf8PathBuf>,

    /// File naming conventions
    pub conventions: Option<FileConventions>,

    /// Merge behaviour
    pub merge: Option<ConfigMerge>,

    /// Class names used by the session tools
    pub session: Option<ConfigSession>,
}

/// The `[merge]` table of oksconf.toml
#[derive(Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigMerge {
    pub on_duplicate: Option<OnDuplicate>,
    pub include_policy: Option<IncludePolicy>,
}

/// The `[session]` table of oksconf.toml
#[derive(Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigSession {
    pub session_class: Option<String>,
    pub resource_class: Option<String>,
}

impl ConfigFile {
    /// Load a configuration from the specified file
    pub fn load(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_context = || format!("Reading config file {path:?}");
        let config_data = std::fs::read_to_string(path).with_context(config_context)?;
        config_data
            .as_str()
            .try_into()
            .with_context(|| format!("Parsing config file {path:?}"))
    }
}

impl TryFrom<&str> for ConfigFile {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ok(toml::from_str(value)?)
    }
}
