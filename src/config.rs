//! `config.toml` loading.
//!
//! The file is optional. Every key is optional too; anything left out falls
//! back to the built-in default, and command-line flags override both.

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::Deserialize;
use sheetquery_core::EvalLimits;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_CONFIG_FILE_BYTES: u64 = 65_536; // 64 KiB

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    log_level: Option<String>,
    limits: Option<LimitsFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LimitsFile {
    max_operations: Option<u64>,
    timeout_ms: Option<u64>,
    max_string_size: Option<usize>,
    max_array_size: Option<usize>,
    max_call_depth: Option<usize>,
}

/// Settings after the config file has been applied over the defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_level: Option<String>,
    pub limits: EvalLimits,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("./data"),
            log_level: None,
            limits: EvalLimits::default(),
        }
    }
}

impl Config {
    /// Load from `explicit`, or from the user config dir when not given.
    ///
    /// An explicit path must exist. The default path is skipped when absent.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => match user_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Config::default()),
            },
        };
        Config::from_file(&path)
    }

    fn from_file(path: &Path) -> Result<Config> {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("Failed to read metadata for {}", path.display()))?;
        if meta.len() > MAX_CONFIG_FILE_BYTES {
            bail!(
                "Refusing to read {}: file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_CONFIG_FILE_BYTES
            );
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Config::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn parse(content: &str) -> Result<Config> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = Config::default();
        if let Some(dir) = file.data_dir {
            config.data_dir = dir;
        }
        config.log_level = file.log_level.filter(|level| !level.trim().is_empty());
        if let Some(limits) = file.limits {
            let target = &mut config.limits;
            if let Some(n) = limits.max_operations {
                target.max_operations = n;
            }
            if let Some(ms) = limits.timeout_ms {
                target.timeout = (ms > 0).then(|| Duration::from_millis(ms));
            }
            if let Some(n) = limits.max_string_size {
                target.max_string_size = n;
            }
            if let Some(n) = limits.max_array_size {
                target.max_array_size = n;
            }
            if let Some(n) = limits.max_call_depth {
                target.max_call_depth = n;
            }
        }
        Ok(config)
    }
}

fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "sheetquery")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}
