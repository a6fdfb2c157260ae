use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:trusty_poll.db";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_KEY_PREFIX: &str = "poll_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be a positive number of milliseconds, got '{value}'")]
    InvalidInterval { name: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Settings for one tab's store.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Period of the polling fallback.
    pub poll_interval: Duration,
    /// Backing-store keys are `key_prefix + poll_id`.
    pub key_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// Reads `DATABASE_URL`, `POLL_INTERVAL_MS` and `POLL_KEY_PREFIX`,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);
        if database_url.trim().is_empty() {
            return Err(ConfigError::Empty("DATABASE_URL"));
        }

        let poll_interval = match lookup("POLL_INTERVAL_MS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError::InvalidInterval {
                        name: "POLL_INTERVAL_MS",
                        value,
                    })
                }
            },
            None => defaults.poll_interval,
        };

        let key_prefix = lookup("POLL_KEY_PREFIX").unwrap_or(defaults.key_prefix);
        if key_prefix.is_empty() {
            return Err(ConfigError::Empty("POLL_KEY_PREFIX"));
        }

        Ok(Self {
            database_url,
            poll_interval,
            key_prefix,
        })
    }

    pub fn storage_key(&self, poll_id: &str) -> String {
        format!("{}{}", self.key_prefix, poll_id)
    }

    pub fn poll_id_from_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.key_prefix.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.storage_key("frontend"), "poll_frontend");
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("POLL_INTERVAL_MS", "250"),
            ("POLL_KEY_PREFIX", "votes:"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.poll_id_from_key("votes:backend"), Some("backend"));
        assert_eq!(config.poll_id_from_key("poll_backend"), None);
    }

    #[test]
    fn rejects_bad_interval() {
        for bad in ["0", "-5", "soon"] {
            let err = Config::from_lookup(lookup(&[("POLL_INTERVAL_MS", bad)])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidInterval { .. }), "{bad}");
        }
        assert!(matches!(
            Config::from_lookup(lookup(&[("POLL_KEY_PREFIX", "")])),
            Err(ConfigError::Empty("POLL_KEY_PREFIX"))
        ));
    }
}
