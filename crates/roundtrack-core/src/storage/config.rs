//! TOML-based application configuration.
//!
//! Stores:
//! - Timer duration, color thresholds and finish sound
//! - Session defaults (active user, process, repeat delta)
//! - Gamification formula and level table
//! - Remote sync endpoint and retry policy
//!
//! Configuration is stored at `~/.config/roundtrack/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::{ConfigError, CoreError};
use crate::gamification::GamificationConfig;
use crate::process::ProcessType;
use crate::sync::RetryPolicy;
use crate::timer::TimerConfig;

/// Session defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// User the CLI acts for when none is given.
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default = "default_process")]
    pub default_process: ProcessType,
    /// Delta applied per step in long-press repeat mode.
    #[serde(default = "default_repeat_delta")]
    pub repeat_delta: u32,
}

/// Remote sync endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL; sync is disabled while empty.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/roundtrack/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub gamification: GamificationConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_process() -> ProcessType {
    ProcessType::Guides
}
fn default_repeat_delta() -> u32 {
    5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            default_process: default_process(),
            repeat_delta: default_repeat_delta(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            session: SessionConfig::default(),
            gamification: GamificationConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                // Optional values serialize as null: accept a number or fall back to text.
                serde_json::Value::Null => match value.parse::<i64>() {
                    Ok(n) => serde_json::Value::Number(n.into()),
                    Err(_) if value.is_empty() || value == "none" => serde_json::Value::Null,
                    Err(_) => serde_json::Value::String(value.into()),
                },
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Reject values that deserialize but make no sense.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.timer.validate()?;
        if self.session.repeat_delta == 0 {
            return Err(ConfigError::InvalidValue {
                key: "session.repeat_delta".into(),
                message: "must be greater than zero".into(),
            }
            .into());
        }
        self.sync.retry.validate()?;
        Ok(())
    }

    /// Load from disk, writing the defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, CoreError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, CoreError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the resulting config is
    /// invalid; `self` is unchanged in that case.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a value by key and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        self.apply(key, value)?;
        self.save()?;
        Ok(())
    }

    /// Every leaf key with its value, in dot-path form.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str(
            "[timer]\nduration_min = 30\nyellow_pct = 60\norange_pct = 30\nred_pct = 5\n",
        )
        .unwrap();
        assert_eq!(parsed.timer.duration_min, 30);
        assert_eq!(parsed.session.repeat_delta, 5);
        assert_eq!(parsed.sync.retry.max_delay_secs, 300);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.duration_min").as_deref(), Some("25"));
        assert_eq!(cfg.get("session.default_process").as_deref(), Some("guides"));
        assert_eq!(cfg.get("sync.retry.base_delay_secs").as_deref(), Some("2"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("timer.sound_on_finish", "false").unwrap();
        cfg.apply("session.default_process", "novelties").unwrap();
        cfg.apply("session.user_id", "3").unwrap();
        cfg.apply("sync.endpoint", "https://example.test/api").unwrap();
        assert!(!cfg.timer.sound_on_finish);
        assert_eq!(cfg.session.default_process, ProcessType::Novelties);
        assert_eq!(cfg.session.user_id, Some(3));
        assert_eq!(cfg.sync.endpoint, "https://example.test/api");
    }

    #[test]
    fn apply_rejects_unknown_key_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("timer.nonexistent", "1"),
            Err(CoreError::Config(ConfigError::UnknownKey(_)))
        ));
        assert!(cfg.apply("timer.sound_on_finish", "maybe").is_err());
        assert!(cfg.apply("session.default_process", "invoices").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn apply_rejects_unordered_thresholds() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("timer.red_pct", "30"),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(cfg.timer.red_pct, 10);
    }

    #[test]
    fn apply_rejects_unbounded_retry_delay() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("sync.retry.max_delay_secs", "18446744073709551615"),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(cfg.sync.retry.max_delay_secs, 300);
        cfg.apply("sync.retry.max_delay_secs", "3600").unwrap();
        assert_eq!(cfg.sync.retry.max_delay_secs, 3600);
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn entries_lists_leaf_keys() {
        let entries = Config::default().entries();
        assert!(entries
            .iter()
            .any(|(k, v)| k == "timer.yellow_pct" && v == "50"));
        assert!(entries.iter().any(|(k, _)| k == "sync.retry.max_attempts"));
    }
}
