//! Layered configuration for the hook runtime.
//!
//! A global file in the user's config directory is merged with a local
//! `.the-hooks/hooks.toml`; values in the local file win key by key.

use std::{
  fs,
  io,
  path::{
    Path,
    PathBuf,
  },
};

use etcetera::base_strategy::{
  BaseStrategy,
  choose_base_strategy,
};
use serde::{
  Deserialize,
  Serialize,
};
use the_hooks_lib::{
  chart::ChartConfig,
  editor_hook::EditorConfig,
};
use the_hooks_runtime::{
  HostConfig,
  SparklineConfig,
  settings::SettingsConfig,
  theme::ThemeConfig,
};
use thiserror::Error;
use toml::Value;

const CONFIG_DIR_ENV: &str = "THE_HOOKS_CONFIG_DIR";
const CONFIG_FILE_NAME: &str = "hooks.toml";
const LOCAL_CONFIG_DIR: &str = ".the-hooks";

/// Tables are merged this deep before values replace each other.
const MERGE_DEPTH: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
  pub editor:    EditorConfig,
  pub chart:     ChartConfig,
  pub sparkline: SparklineConfig,
  pub settings:  SettingsConfig,
  pub theme:     ThemeConfig,
  pub storage:   StorageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct StorageConfig {
  /// JSON file backing persistent storage. Storage is in-memory when unset.
  pub path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
  #[error("invalid config: {0}")]
  BadConfig(#[from] toml::de::Error),
  #[error("failed to read config: {0}")]
  Error(#[from] io::Error),
}

impl ConfigLoadError {
  fn is_not_found(&self) -> bool {
    matches!(self, Self::Error(err) if err.kind() == io::ErrorKind::NotFound)
  }
}

impl Config {
  /// Merge the `local` document onto the `global` one. Either may be
  /// missing; a syntax or schema error in either is returned.
  pub fn load(
    global: Result<String, ConfigLoadError>,
    local: Result<String, ConfigLoadError>,
  ) -> Result<Config, ConfigLoadError> {
    let parse = |file: String| toml::from_str::<Value>(&file).map_err(ConfigLoadError::BadConfig);
    let global = global.and_then(parse);
    let local = local.and_then(parse);

    let merged = match (global, local) {
      (Err(ConfigLoadError::BadConfig(err)), _) | (_, Err(ConfigLoadError::BadConfig(err))) => {
        return Err(ConfigLoadError::BadConfig(err));
      },
      (Ok(global), Ok(local)) => merge_toml_values(global, local, MERGE_DEPTH),
      (Ok(config), Err(_)) | (Err(_), Ok(config)) => config,
      (Err(err), Err(_)) => return Err(err),
    };
    Ok(merged.try_into()?)
  }

  /// Load from explicit global and local paths. Missing files fall back to
  /// the defaults.
  pub fn load_files(global: &Path, local: &Path) -> Result<Config, ConfigLoadError> {
    let read = |path: &Path| fs::read_to_string(path).map_err(ConfigLoadError::Error);
    match Self::load(read(global), read(local)) {
      Err(err) if err.is_not_found() => {
        tracing::debug!(global = %global.display(), "no config files found, using defaults");
        Ok(Config::default())
      },
      result => result,
    }
  }

  /// Load the user's global config merged with the local one in the current
  /// directory.
  pub fn load_user() -> Result<Config, ConfigLoadError> {
    match config_file() {
      Some(global) => Self::load_files(&global, &local_config_file()),
      None => {
        let local = fs::read_to_string(local_config_file()).map_err(ConfigLoadError::Error);
        let global = Err(ConfigLoadError::Error(io::ErrorKind::NotFound.into()));
        match Self::load(global, local) {
          Err(err) if err.is_not_found() => Ok(Config::default()),
          result => result,
        }
      },
    }
  }

  pub fn host_config(&self) -> HostConfig {
    HostConfig {
      editor:   self.editor.clone(),
      chart:    self.chart.clone(),
      settings: self.settings.clone(),
      theme:    self.theme.clone(),
    }
  }
}

/// The user's config directory for the hooks, honouring
/// `THE_HOOKS_CONFIG_DIR`.
pub fn config_dir() -> Option<PathBuf> {
  if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
    return Some(PathBuf::from(dir));
  }
  match choose_base_strategy() {
    Ok(strategy) => Some(strategy.config_dir().join("the-hooks")),
    Err(err) => {
      tracing::warn!(%err, "unable to find the config directory");
      None
    },
  }
}

pub fn config_file() -> Option<PathBuf> {
  config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

pub fn local_config_file() -> PathBuf {
  PathBuf::from(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
}

/// Merge `right` onto `left`. Tables are merged key by key up to
/// `merge_depth` levels deep; anything else in `right` replaces `left`.
pub fn merge_toml_values(left: Value, right: Value, merge_depth: usize) -> Value {
  match (left, right) {
    (Value::Table(mut left_map), Value::Table(right_map)) if merge_depth > 0 => {
      for (name, right_value) in right_map {
        let merged = match left_map.remove(&name) {
          Some(left_value) => merge_toml_values(left_value, right_value, merge_depth - 1),
          None => right_value,
        };
        left_map.insert(name, merged);
      }
      Value::Table(left_map)
    },
    (_, right) => right,
  }
}
