//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.vas2nets-sms/config.json`).
//! Vendor credentials can be overridden by environment variables so they can
//! be kept out of the file.

use crate::vendor::Credentials;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level transport config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Vendor endpoint for outbound messages. Required.
    pub outbound_url: Option<String>,

    /// Timeout in seconds for outbound requests. Absent means no timeout
    /// (the vendor's documented behaviour; see DESIGN.md before relying on it).
    pub outbound_request_timeout: Option<u64>,

    /// Vendor account username. Overridden by VAS2NETS_USERNAME env when set.
    pub username: Option<String>,

    /// Vendor account password. Overridden by VAS2NETS_PASSWORD env when set.
    pub password: Option<String>,

    /// Inbound HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Bind address and port for the inbound delivery-notification listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for inbound HTTP (default 15252).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

fn default_server_port() -> u16 {
    15252
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

fn env_or(var: &str, fallback: Option<&String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            fallback
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the vendor username: env VAS2NETS_USERNAME overrides config.
pub fn resolve_username(config: &Config) -> Option<String> {
    env_or("VAS2NETS_USERNAME", config.username.as_ref())
}

/// Resolve the vendor password: env VAS2NETS_PASSWORD overrides config.
pub fn resolve_password(config: &Config) -> Option<String> {
    env_or("VAS2NETS_PASSWORD", config.password.as_ref())
}

impl Config {
    /// Names of required options that are missing or empty. Empty list means
    /// the config is usable.
    pub fn validate(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self
            .outbound_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .is_none()
        {
            missing.push("outboundUrl");
        }
        if resolve_username(self).is_none() {
            missing.push("username");
        }
        if resolve_password(self).is_none() {
            missing.push("password");
        }
        missing
    }

    /// Resolved vendor credentials, or None when either half is missing.
    pub fn credentials(&self) -> Option<Credentials> {
        Some(Credentials {
            username: resolve_username(self)?,
            password: resolve_password(self)?,
        })
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("VAS2NETS_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".vas2nets-sms").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or VAS2NETS_CONFIG_PATH). Missing file
/// => default config; `validate` reports what still has to be provided.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(default_config_path);
    if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        return Ok(Config::default());
    }
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parsing config from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    // Tests that touch VAS2NETS_* env vars must not run concurrently with
    // each other or with credential resolution against an unexpected
    // environment; they all hold this lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn default_server_port_and_bind() {
        let s = ServerConfig::default();
        assert_eq!(s.port, 15252);
        assert_eq!(s.bind, "127.0.0.1");
    }

    #[test]
    fn validate_reports_all_missing_options() {
        let _guard = env_lock();
        std::env::remove_var("VAS2NETS_USERNAME");
        std::env::remove_var("VAS2NETS_PASSWORD");
        let config = Config::default();
        assert_eq!(
            config.validate(),
            vec!["outboundUrl", "username", "password"]
        );
    }

    #[test]
    fn validate_accepts_complete_config() {
        let _guard = env_lock();
        std::env::remove_var("VAS2NETS_USERNAME");
        std::env::remove_var("VAS2NETS_PASSWORD");
        let config = Config {
            outbound_url: Some("http://vendor.example/send".to_string()),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_empty());
    }

    #[test]
    fn validate_treats_blank_values_as_missing() {
        let _guard = env_lock();
        std::env::remove_var("VAS2NETS_USERNAME");
        std::env::remove_var("VAS2NETS_PASSWORD");
        let config = Config {
            outbound_url: Some("  ".to_string()),
            username: Some("user".to_string()),
            password: Some("".to_string()),
            ..Config::default()
        };
        assert_eq!(config.validate(), vec!["outboundUrl", "password"]);
    }

    #[test]
    fn credentials_from_config_values() {
        let _guard = env_lock();
        std::env::remove_var("VAS2NETS_USERNAME");
        std::env::remove_var("VAS2NETS_PASSWORD");
        let config = Config {
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..Config::default()
        };
        let creds = config.credentials().expect("credentials");
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "pass");
    }

    #[test]
    fn env_credentials_override_config_values() {
        let _guard = env_lock();
        let config = Config {
            username: Some("file-user".to_string()),
            password: Some("file-pass".to_string()),
            ..Config::default()
        };

        // Env wins over the file; a whitespace-only env value does not count
        // as set and falls back to the file.
        std::env::set_var("VAS2NETS_USERNAME", "env-user");
        std::env::set_var("VAS2NETS_PASSWORD", "   ");
        assert_eq!(resolve_username(&config).as_deref(), Some("env-user"));
        assert_eq!(resolve_password(&config).as_deref(), Some("file-pass"));
        let creds = config.credentials().expect("credentials");
        assert_eq!(creds.username, "env-user");
        assert_eq!(creds.password, "file-pass");

        // With the vars removed, the file values resolve again.
        std::env::remove_var("VAS2NETS_USERNAME");
        std::env::remove_var("VAS2NETS_PASSWORD");
        assert_eq!(resolve_username(&config).as_deref(), Some("file-user"));
        assert_eq!(resolve_password(&config).as_deref(), Some("file-pass"));
    }

    #[test]
    fn env_credentials_satisfy_validate_without_file_values() {
        let _guard = env_lock();
        std::env::set_var("VAS2NETS_USERNAME", "env-user");
        std::env::set_var("VAS2NETS_PASSWORD", "env-pass");
        let config = Config {
            outbound_url: Some("http://vendor.example/send".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_empty());
        std::env::remove_var("VAS2NETS_USERNAME");
        std::env::remove_var("VAS2NETS_PASSWORD");
    }

    #[test]
    fn config_parses_camel_case_keys() {
        let config: Config = serde_json::from_str(
            r#"{
                "outboundUrl": "http://vendor.example/send",
                "outboundRequestTimeout": 30,
                "username": "u",
                "password": "p",
                "server": { "port": 8080 }
            }"#,
        )
        .expect("parse");
        assert_eq!(
            config.outbound_url.as_deref(),
            Some("http://vendor.example/send")
        );
        assert_eq!(config.outbound_request_timeout, Some(30));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "127.0.0.1");
    }
}
