use serde::Deserialize;
use std::{env, path::PathBuf};
use thiserror::Error;

use crate::coordinator::CoordinatorSettings;

/// Environment variable that overrides the state document location.
pub const STATE_PATH_ENV: &str = "ACCORD_STATE_PATH";

// Default value function for serde (bool::default() is false, so only true needs a fn)
pub(crate) const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct AccordConfig {
    pub store: Option<StoreConfig>,
    pub merge: Option<MergeConfig>,
    pub workflow: Option<WorkflowConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Location of the state document. Supports `${VAR}` expansion.
    pub path: Option<String>,
    /// Write the state document after every mutating operation.
    #[serde(default = "default_true")]
    pub autosave: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct MergeConfig {
    /// Strategy tag recorded when a merge does not name one. Default: "recursive".
    pub default_strategy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkflowConfig {
    /// Time units estimated per mapped phase. Default: 5.
    pub units_per_phase: Option<u32>,
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find("${") {
        let Some(close_rel) = rest[open + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        let var = &rest[open + 2..open + 2 + close_rel];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[open + 2 + close_rel + 1..];
    }

    out.push_str(rest);
    out
}

impl AccordConfig {
    /// Load `~/.accord/config.toml`. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        Self::load_from(path)
    }

    pub fn load_from(path: PathBuf) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Resolve the state document path: env override, then `[store] path`,
    /// then `~/.accord/protocols.json`.
    #[must_use]
    pub fn state_path(&self) -> Option<PathBuf> {
        if let Ok(raw) = env::var(STATE_PATH_ENV)
            && !raw.trim().is_empty()
        {
            return Some(PathBuf::from(raw.trim()));
        }
        self.configured_state_path().or_else(default_state_path)
    }

    fn configured_state_path(&self) -> Option<PathBuf> {
        let raw = self.store.as_ref()?.path.as_deref()?;
        let expanded = expand_env_vars(raw);
        let trimmed = expanded.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }

    #[must_use]
    pub fn autosave(&self) -> bool {
        self.store.as_ref().is_none_or(|store| store.autosave)
    }

    #[must_use]
    pub fn default_strategy(&self) -> &str {
        self.merge
            .as_ref()
            .and_then(|merge| merge.default_strategy.as_deref())
            .map(str::trim)
            .filter(|strategy| !strategy.is_empty())
            .unwrap_or(crate::DEFAULT_MERGE_STRATEGY)
    }

    #[must_use]
    pub fn units_per_phase(&self) -> u32 {
        self.workflow
            .as_ref()
            .and_then(|workflow| workflow.units_per_phase)
            .filter(|units| *units > 0)
            .unwrap_or(crate::DEFAULT_UNITS_PER_PHASE)
    }

    /// Settings for a coordinator; autosave targets `state_path` when enabled.
    #[must_use]
    pub fn coordinator_settings(&self, state_path: Option<PathBuf>) -> CoordinatorSettings {
        CoordinatorSettings {
            default_strategy: self.default_strategy().to_string(),
            units_per_phase: self.units_per_phase(),
            autosave_path: state_path.filter(|_| self.autosave()),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".accord").join("config.toml"))
}

pub fn default_state_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".accord").join("protocols.json"))
}
