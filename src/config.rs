use crate::auth::StaticAuthorizer;
use crate::error::{TournamentError, TournamentResult};
use crate::types::*;
use std::{
  env,
  fs,
  path::{Path, PathBuf},
};

pub fn repo_root() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    repo_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  repo_root().join("config.json")
}

pub fn logs_dir() -> PathBuf {
  repo_root().join("logs")
}

pub fn audit_log_path() -> PathBuf {
  logs_dir().join("audit.log")
}

pub fn session_file_path() -> PathBuf {
  repo_root().join("data").join(".admin_session")
}

pub fn local_state_path(config: &AppConfig) -> PathBuf {
  resolve_repo_path(config.local_state_path.trim())
}

pub fn view_dir(config: &AppConfig) -> PathBuf {
  resolve_repo_path(config.view_dir.trim())
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

/// Comma or newline separated; blanks dropped.
pub fn parse_admin_codes(raw: &str) -> Vec<String> {
  raw
    .split([',', '\n'])
    .map(|code| code.trim())
    .filter(|code| !code.is_empty())
    .map(|code| code.to_string())
    .collect()
}

pub fn apply_env_defaults(config: AppConfig) -> AppConfig {
  apply_env_defaults_with(config, env_default)
}

/// Fills blank config fields from `lookup`. The tournament name is also
/// replaced when it is still the built-in default.
pub fn apply_env_defaults_with(mut config: AppConfig, lookup: impl Fn(&str) -> Option<String>) -> AppConfig {
  if config.remote_url.trim().is_empty() {
    if let Some(value) = lookup("BRACKET_REMOTE_URL") {
      config.remote_url = value;
    }
  }
  if config.remote_key.trim().is_empty() {
    if let Some(value) = lookup("BRACKET_REMOTE_KEY") {
      config.remote_key = value;
    }
  }
  if config.admin_codes.iter().all(|code| code.trim().is_empty()) {
    if let Some(value) = lookup("BRACKET_ADMIN_CODES") {
      config.admin_codes = parse_admin_codes(&value);
    }
  }
  let name = config.tournament_name.trim();
  if name.is_empty() || name == DEFAULT_TOURNAMENT_NAME {
    config.tournament_name = lookup("BRACKET_TOURNAMENT_NAME").unwrap_or_else(|| DEFAULT_TOURNAMENT_NAME.to_string());
  }
  if config.max_participants < MIN_PARTICIPANTS {
    config.max_participants = DEFAULT_MAX_PARTICIPANTS;
  }
  config
}

pub fn load_config_inner() -> TournamentResult<AppConfig> {
  Ok(apply_env_defaults(load_config_from(&config_path())?))
}

pub fn load_config_from(path: &Path) -> TournamentResult<AppConfig> {
  if !path.is_file() {
    return Ok(AppConfig::default());
  }
  let data = fs::read_to_string(path)
    .map_err(|e| TournamentError::Config(format!("read config {}: {e}", path.display())))?;
  serde_json::from_str::<AppConfig>(&data)
    .map_err(|e| TournamentError::Config(format!("parse config {}: {e}", path.display())))
}

/// Loads `.env` from the repo root without overriding variables that are
/// already set.
pub fn load_env_file() {
  let env_path = repo_root().join(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for line in contents.lines() {
    if let Some((key, value)) = parse_env_line(line) {
      if env::var_os(&key).is_none() {
        env::set_var(key, value);
      }
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
  let mut value = raw_value.trim();
  if value.len() >= 2
    && ((value.starts_with('"') && value.ends_with('"')) || (value.starts_with('\'') && value.ends_with('\'')))
  {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

pub fn log_config_warnings(config: &AppConfig) {
  for msg in config_warnings(config) {
    tracing::warn!("{}", msg);
  }
}

pub fn config_warnings(config: &AppConfig) -> Vec<&'static str> {
  let mut warnings = Vec::new();

  if !config.has_remote() {
    warnings.push("BRACKET_REMOTE_URL / BRACKET_REMOTE_KEY not set; running offline with the local state file");
    if StaticAuthorizer::new(&config.admin_codes).is_empty() {
      warnings.push("no adminCodes and no BRACKET_ADMIN_CODES; nobody can log in to edit the bracket");
    }
  }
  if config.max_participants > DEFAULT_MAX_PARTICIPANTS {
    warnings.push("maxParticipants is above 128; large brackets may not fit the view");
  }
  warnings
}
