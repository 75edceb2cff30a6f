use crate::generator::Seeding;
use crate::rating::{DEFAULT_RATING, K_FACTOR};
use serde::{Deserialize, Serialize};
use std::{
  env,
  fs,
  path::{Path, PathBuf},
};

pub const CONFIG_FILE: &str = "bracket-engine.json";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:17990";
pub const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
  /// Directory for the JSON store. Empty keeps everything in memory.
  pub data_dir: String,
  pub bind_addr: String,
  pub log_dir: String,
  pub k_factor: f64,
  pub default_rating: f64,
  pub shuffle_participants: bool,
  pub shuffle_seed: Option<u64>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    EngineConfig {
      data_dir: String::new(),
      bind_addr: DEFAULT_BIND_ADDR.to_string(),
      log_dir: DEFAULT_LOG_DIR.to_string(),
      k_factor: K_FACTOR,
      default_rating: DEFAULT_RATING,
      shuffle_participants: true,
      shuffle_seed: None,
    }
  }
}

impl EngineConfig {
  pub fn seeding(&self) -> Seeding {
    if self.shuffle_participants {
      Seeding::Shuffled
    } else {
      Seeding::AsListed
    }
  }

  pub fn data_path(&self) -> Option<PathBuf> {
    let trimmed = self.data_dir.trim();
    if trimmed.is_empty() {
      None
    } else {
      Some(PathBuf::from(trimmed))
    }
  }
}

pub fn config_path() -> PathBuf {
  env_default("BRACKET_ENGINE_CONFIG")
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

fn flag_value(raw: &str) -> bool {
  let value = raw.trim().to_ascii_lowercase();
  matches!(value.as_str(), "1" | "true" | "yes" | "on")
}

/// Layers `BRACKET_*` overrides from `lookup` on top of `config`.
pub fn apply_overrides<F>(mut config: EngineConfig, lookup: F) -> Result<EngineConfig, String>
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(value) = lookup("BRACKET_DATA_DIR") {
    config.data_dir = value;
  }
  if let Some(value) = lookup("BRACKET_BIND_ADDR") {
    config.bind_addr = value;
  }
  if let Some(value) = lookup("BRACKET_LOG_DIR") {
    config.log_dir = value;
  }
  if let Some(value) = lookup("BRACKET_K_FACTOR") {
    config.k_factor = value
      .parse::<f64>()
      .map_err(|e| format!("BRACKET_K_FACTOR {value:?}: {e}"))?;
  }
  if let Some(value) = lookup("BRACKET_SHUFFLE_SEED") {
    config.shuffle_seed = Some(
      value
        .parse::<u64>()
        .map_err(|e| format!("BRACKET_SHUFFLE_SEED {value:?}: {e}"))?,
    );
  }
  if let Some(value) = lookup("BRACKET_SHUFFLE") {
    config.shuffle_participants = flag_value(&value);
  }
  if !config.k_factor.is_finite() || config.k_factor <= 0.0 {
    return Err(format!("kFactor must be positive, got {}", config.k_factor));
  }
  Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<EngineConfig, String> {
  if !path.is_file() {
    return Ok(EngineConfig::default());
  }
  let data = fs::read_to_string(path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  serde_json::from_str::<EngineConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))
}

/// Config file first, then the process environment on top.
pub fn load_config() -> Result<EngineConfig, String> {
  let config = load_config_from(&config_path())?;
  apply_overrides(config, env_default)
}

/// Loads `.env` from the working directory. Variables already set win.
pub fn load_env_file() {
  let env_path = PathBuf::from(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for (key, value) in contents.lines().filter_map(parse_env_line) {
    if env::var_os(&key).is_none() {
      env::set_var(key, value);
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let value = raw_value.trim();
  let unquoted = ['"', '\'']
    .iter()
    .find_map(|quote| value.strip_prefix(*quote).and_then(|rest| rest.strip_suffix(*quote)));
  let value = match unquoted {
    Some(inner) => inner,
    None => value.split('#').next().unwrap_or_default().trim_end(),
  };
  Some((key.to_string(), value.to_string()))
}

pub fn log_config_warnings(config: &EngineConfig) {
  let mut warnings = Vec::new();
  if config.data_path().is_none() {
    warnings.push("BRACKET_DATA_DIR not set and no dataDir in config; tournaments are kept in memory only");
  }
  if !config.shuffle_participants {
    warnings.push("participant shuffling is off; brackets follow the submitted order");
  }
  for msg in warnings {
    tracing::warn!("{}", msg);
  }
}
