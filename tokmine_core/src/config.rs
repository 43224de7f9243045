use crate::allowlist::DEFAULT_ALLOW_LIST_PATH;
use anyhow::Context;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default file the CLI looks for when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "harness.toml";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    #[default]
    Exhaustive,
    Random,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Exhaustive => "exhaustive",
            Strategy::Random => "random",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exhaustive" => Ok(Strategy::Exhaustive),
            "random" => Ok(Strategy::Random),
            other => Err(anyhow::anyhow!(
                "Unknown exploration strategy '{other}', expected 'exhaustive' or 'random'"
            )),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ExplorerSettings {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_max_paths")]
    pub max_paths: u64,
    #[serde(default)]
    pub seed: u64,
}

pub fn default_max_paths() -> u64 {
    100_000
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_paths: default_max_paths(),
            seed: 0,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct AllowListSettings {
    #[serde(default = "default_allow_list_path")]
    pub path: PathBuf,
}

pub fn default_allow_list_path() -> PathBuf {
    PathBuf::from(DEFAULT_ALLOW_LIST_PATH)
}

impl Default for AllowListSettings {
    fn default() -> Self {
        Self {
            path: default_allow_list_path(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct SubjectSettings {
    #[serde(default = "default_subject_name")]
    pub name: String,
}

fn default_subject_name() -> String {
    "calc".to_string()
}

impl Default for SubjectSettings {
    fn default() -> Self {
        Self {
            name: default_subject_name(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    #[serde(default)]
    pub explorer: ExplorerSettings,
    #[serde(default)]
    pub allow_list: AllowListSettings,
    #[serde(default)]
    pub subject: SubjectSettings,
}

impl HarnessConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {path:?}"))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {path:?}"))
    }

    pub fn parse(content: &str) -> Result<Self, anyhow::Error> {
        let config: HarnessConfig =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        if config.explorer.max_paths == 0 {
            anyhow::bail!("explorer.max-paths must be at least 1");
        }
        Ok(config)
    }
}
