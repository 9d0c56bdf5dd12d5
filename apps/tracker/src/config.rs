//! Tracker configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/killtrack/config.toml`
//! - Windows: `%APPDATA%/killtrack/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the client's `Game.log`.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Base URL of the reporting service. Required.
    #[serde(default)]
    pub api_base_url: String,

    /// Delay between polls when the log has nothing new, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Where the validated key is cached. Defaults next to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,

    /// Local lifetime of an activated key, in hours.
    #[serde(default = "default_key_ttl_hours")]
    pub key_ttl_hours: u32,

    /// Ask the service to hide the victim's name.
    #[serde(default)]
    pub anonymize: bool,

    /// Stop monitoring after this many hours (0 = never).
    #[serde(default = "default_session_limit_hours")]
    pub session_limit_hours: u32,
}

fn default_log_path() -> PathBuf {
    PathBuf::from(r"C:\Program Files\Roberts Space Industries\StarCitizen\LIVE\Game.log")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_key_ttl_hours() -> u32 {
    72
}

fn default_session_limit_hours() -> u32 {
    72
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            api_base_url: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            key_file: None,
            key_ttl_hours: default_key_ttl_hours(),
            anonymize: false,
            session_limit_hours: default_session_limit_hours(),
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or the default location), creating
    /// a default file if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };
        Self::load_from(&path)
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!(path = %path.display(), "wrote default configuration");
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn key_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.key_ttl_hours))
    }

    /// `None` when the session limit is disabled.
    pub fn session_limit(&self) -> Option<Duration> {
        (self.session_limit_hours > 0)
            .then(|| Duration::from_secs(u64::from(self.session_limit_hours) * 3600))
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    let base = killtrack_reporter::key_store::config_dir()
        .context("no config directory (HOME/APPDATA unset)")?;
    Ok(base.join("killtrack").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.log_path.to_string_lossy().ends_with("Game.log"));
        assert!(config.api_base_url.is_empty());
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.key_ttl(), chrono::Duration::hours(72));
        assert!(!config.anonymize);
        assert_eq!(config.session_limit(), Some(Duration::from_secs(72 * 3600)));
    }

    #[test]
    fn config_partial_toml() {
        let toml_str = r#"
            api_base_url = "https://tracker.example.org"
            anonymize = true
            session_limit_hours = 0
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_base_url, "https://tracker.example.org");
        assert!(config.anonymize);
        assert_eq!(config.session_limit(), None);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.key_file, None);
    }

    #[test]
    fn load_creates_default_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sub").join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");

        let config = Config {
            log_path: "/games/sc/Game.log".into(),
            api_base_url: "http://127.0.0.1:25966".into(),
            key_file: Some("/tmp/key.json".into()),
            poll_interval_ms: 250,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let config = Config {
            poll_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "poll_interval_ms = \"soon\"").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
