use crate::error::EngineError;
use crate::odds::TrialBudget;
use crate::types::*;
use chrono::Local;
use std::{
    env,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_STATIC_DIR: &str = "public";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

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

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

/// Numeric override; unparsable values are reported and ignored.
pub fn env_trials(key: &str) -> Option<i64> {
  let raw = env_default(key)?;
  match raw.parse::<i64>() {
    Ok(value) => Some(value),
    Err(e) => {
      tracing::warn!("Ignoring {key}={raw}: {e}");
      None
    }
  }
}

/// Fills empty fields from the environment, then built-in defaults.
pub fn apply_env_defaults(mut config: AppConfig) -> AppConfig {
  let fill = |field: &mut String, key: &str, fallback: &str| {
    if field.trim().is_empty() {
      *field = env_default(key).unwrap_or_else(|| fallback.to_string());
    }
  };
  fill(&mut config.data_dir, "POOL_DATA_DIR", DEFAULT_DATA_DIR);
  fill(&mut config.static_dir, "POOL_STATIC_DIR", DEFAULT_STATIC_DIR);
  fill(&mut config.log_dir, "POOL_LOG_DIR", DEFAULT_LOG_DIR);
  fill(&mut config.bind_addr, "POOL_BIND_ADDR", DEFAULT_BIND_ADDR);

  if let Some(trials) = env_trials("POOL_TRIALS") {
    config.authoritative_trials = trials;
  }
  if let Some(trials) = env_trials("POOL_INTERACTIVE_TRIALS") {
    config.interactive_trials = trials;
  }
  config
}

pub fn load_config_inner() -> Result<AppConfig, String> {
  load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, String> {
  if !path.is_file() {
    return Ok(apply_env_defaults(AppConfig::default()));
  }
  let data = fs::read_to_string(path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  let config =
    serde_json::from_str::<AppConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))?;
  Ok(apply_env_defaults(config))
}

impl AppConfig {
  pub fn data_path(&self) -> PathBuf {
    resolve_repo_path(&self.data_dir)
  }

  pub fn static_path(&self) -> PathBuf {
    resolve_repo_path(&self.static_dir)
  }

  pub fn log_path(&self) -> PathBuf {
    resolve_repo_path(&self.log_dir)
  }

  pub fn authoritative_budget(&self) -> Result<TrialBudget, EngineError> {
    TrialBudget::new(self.authoritative_trials)
  }

  pub fn interactive_budget(&self) -> Result<TrialBudget, EngineError> {
    TrialBudget::new(self.interactive_trials)
  }
}

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

/// Appends a timestamped entry to `commits.log` in `log_dir`. Failures are ignored.
pub fn append_commit_log(log_dir: &Path, label: &str, payload: &str) {
  if fs::create_dir_all(log_dir).is_err() {
    return;
  }
  let path = log_dir.join("commits.log");
  let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
  let entry = format!("[{timestamp}] {label}\n{payload}\n\n");
  if let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(&path) {
    let _ = file.write_all(entry.as_bytes());
  }
}

pub fn log_env_warnings(config: &AppConfig) {
  let mut warnings = Vec::new();

  let data = config.data_path();
  if !data.is_dir() {
    warnings.push(format!(
      "Data directory {} does not exist; set POOL_DATA_DIR or dataDir in config.json",
      data.display()
    ));
  }
  let static_dir = config.static_path();
  if !static_dir.is_dir() {
    warnings.push(format!("Static directory {} does not exist; only the API will be served", static_dir.display()));
  }
  if config.authoritative_trials <= 0 || config.interactive_trials <= 0 {
    warnings.push("Trial counts must be positive; odds requests will be rejected".to_string());
  }

  for msg in warnings {
    tracing::warn!("{}", msg);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_env_line() {
    assert_eq!(parse_env_line("# comment"), None);
    assert_eq!(parse_env_line("   "), None);
    assert_eq!(parse_env_line("=value"), None);
    assert_eq!(
      parse_env_line("export POOL_DATA_DIR=\"/srv/pool data\""),
      Some(("POOL_DATA_DIR".to_string(), "/srv/pool data".to_string()))
    );
    assert_eq!(
      parse_env_line("POOL_TRIALS=5000 # quick"),
      Some(("POOL_TRIALS".to_string(), "5000".to_string()))
    );
    assert_eq!(
      parse_env_line("POOL_BIND_ADDR='0.0.0.0:8080'"),
      Some(("POOL_BIND_ADDR".to_string(), "0.0.0.0:8080".to_string()))
    );
  }

  #[test]
  fn test_resolve_repo_path() {
    assert_eq!(resolve_repo_path("data"), repo_root().join("data"));
    let absolute = std::env::temp_dir().join("pool");
    assert_eq!(resolve_repo_path(&absolute.to_string_lossy()), absolute);
  }

  #[test]
  fn test_partial_config_file_keeps_defaults() {
    let dir = std::env::temp_dir().join(format!("pool-config-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.json");
    fs::write(&path, r#"{"dataDir":"/srv/pool","bindAddr":"0.0.0.0:9000"}"#).unwrap();

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.data_dir, "/srv/pool");
    assert_eq!(config.bind_addr, "0.0.0.0:9000");
    assert!(!config.static_dir.is_empty());
    assert!(config.authoritative_trials > 0);

    fs::write(&path, "{not json").unwrap();
    let err = load_config_from(&path).unwrap_err();
    assert!(err.starts_with("parse config"));
    let _ = fs::remove_dir_all(&dir);
  }

  #[test]
  fn test_budgets_follow_config() {
    let config = AppConfig {
      authoritative_trials: 250,
      interactive_trials: 0,
      ..AppConfig::default()
    };
    assert_eq!(config.authoritative_budget().map(TrialBudget::get), Ok(250));
    assert_eq!(config.interactive_budget(), Err(EngineError::InvalidTrialCount(0)));
  }

  #[test]
  fn test_commit_log_appends() {
    let dir = std::env::temp_dir().join(format!("pool-commit-log-{}", std::process::id()));
    append_commit_log(&dir, "commit", "7 matchups");
    append_commit_log(&dir, "commit", "7 matchups");
    let contents = fs::read_to_string(dir.join("commits.log")).unwrap();
    assert_eq!(contents.matches("] commit\n7 matchups").count(), 2);
    let _ = fs::remove_dir_all(&dir);
  }
}
