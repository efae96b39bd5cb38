use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "MedThread";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:4000";
pub const DB_FILE_NAME: &str = "medthread.db";

pub const ENV_BIND_ADDR: &str = "MEDTHREAD_BIND_ADDR";
pub const ENV_DB_PATH: &str = "MEDTHREAD_DB_PATH";
pub const ENV_DOCTOR_DIRECTORY_URL: &str = "MEDTHREAD_DOCTOR_DIRECTORY_URL";

/// Get the application data directory: ~/MedThread/
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "medthread_lib=debug,tower_http=debug,info"
    } else {
        "medthread_lib=info,tower_http=info,warn"
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Runtime settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub doctor_directory_url: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let raw_addr = get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: ENV_BIND_ADDR,
                value: raw_addr.clone(),
            })?;

        let db_path = get(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| app_data_dir().join(DB_FILE_NAME));

        Ok(Self {
            bind_addr,
            db_path,
            doctor_directory_url: get(ENV_DOCTOR_DIRECTORY_URL),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn app_data_dir_named_after_app() {
        assert!(app_data_dir().ends_with("MedThread"));
    }

    #[test]
    fn defaults_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.bind_addr, "127.0.0.1:4000".parse().unwrap());
        assert!(s.db_path.ends_with("MedThread/medthread.db"));
        assert!(s.doctor_directory_url.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let s = settings(&[
            (ENV_BIND_ADDR, "0.0.0.0:8080"),
            (ENV_DB_PATH, "/tmp/test.db"),
            (ENV_DOCTOR_DIRECTORY_URL, "https://directory.example"),
        ])
        .unwrap();
        assert_eq!(s.bind_addr.port(), 8080);
        assert_eq!(s.db_path, PathBuf::from("/tmp/test.db"));
        assert_eq!(s.doctor_directory_url.as_deref(), Some("https://directory.example"));
    }

    #[test]
    fn blank_values_fall_back() {
        let s = settings(&[(ENV_DOCTOR_DIRECTORY_URL, "  "), (ENV_BIND_ADDR, "")]).unwrap();
        assert!(s.doctor_directory_url.is_none());
        assert_eq!(s.bind_addr.port(), 4000);
    }

    #[test]
    fn invalid_bind_addr_rejected() {
        let err = settings(&[(ENV_BIND_ADDR, "not-an-addr")]).unwrap_err();
        assert!(err.to_string().contains(ENV_BIND_ADDR));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.3.0");
    }
}
