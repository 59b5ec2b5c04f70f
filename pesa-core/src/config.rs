//! Configuration management
//!
//! settings.json in the data directory:
//! ```json
//! {
//!   "app": { "demoMode": false, ... },
//!   "backend": {
//!     "apiKey": "...",
//!     "functionsUrl": "https://<region>-<project>.cloudfunctions.net",
//!     "authUrl": "https://identitytoolkit.googleapis.com/v1",
//!     "tokenUrl": "https://securetoken.googleapis.com/v1",
//!     "requestTimeoutSecs": 30
//!   },
//!   "transactions": { "limit": 50 }
//! }
//! ```
//!
//! Every field can be overridden from the environment (`PESA_DEMO_MODE`,
//! `PESA_API_KEY`, `PESA_FUNCTIONS_URL`, `PESA_AUTH_URL`, `PESA_TOKEN_URL`,
//! `PESA_REQUEST_TIMEOUT_SECS`, `PESA_TRANSACTION_LIMIT`). Saving writes
//! back demo mode only; every other field is preserved as found.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::adapters::http::{HttpBackendConfig, DEFAULT_AUTH_URL, DEFAULT_TOKEN_URL};
use crate::services::DEFAULT_TRANSACTION_LIMIT;

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    backend: BackendSettings,
    #[serde(default)]
    transactions: TransactionSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    demo_mode: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    functions_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_timeout_secs: Option<u64>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Pesa configuration (resolved view of settings + environment)
#[derive(Debug, Clone)]
pub struct Config {
    pub demo_mode: bool,
    pub api_key: Option<String>,
    pub functions_url: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub request_timeout: Duration,
    pub transaction_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            demo_mode: false,
            api_key: None,
            functions_url: None,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            transaction_limit: DEFAULT_TRANSACTION_LIMIT,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" | "yes" | "TRUE" | "YES" => Some(true),
        "false" | "0" | "no" | "FALSE" | "NO" => Some(false),
        _ => None,
    }
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "ignoring malformed settings file");
        SettingsFile::default()
    }))
}

impl Config {
    /// Load config from the data directory, applying environment overrides
    pub fn load(pesa_dir: &Path) -> Result<Self> {
        Self::load_with_env(pesa_dir, |name| std::env::var(name).ok())
    }

    /// Load config with a custom environment lookup
    pub fn load_with_env(pesa_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = read_settings(&pesa_dir.join(SETTINGS_FILE))?;
        let defaults = Config::default();

        let demo_mode = env("PESA_DEMO_MODE")
            .as_deref()
            .and_then(parse_flag)
            .unwrap_or(raw.app.demo_mode);

        let non_empty = |v: String| {
            let v = v.trim().to_string();
            (!v.is_empty()).then_some(v)
        };
        let api_key = env("PESA_API_KEY")
            .and_then(non_empty)
            .or(raw.backend.api_key.and_then(non_empty));
        let functions_url = env("PESA_FUNCTIONS_URL")
            .and_then(non_empty)
            .or(raw.backend.functions_url.and_then(non_empty));
        let auth_url = env("PESA_AUTH_URL")
            .and_then(non_empty)
            .or(raw.backend.auth_url.and_then(non_empty))
            .unwrap_or(defaults.auth_url);
        let token_url = env("PESA_TOKEN_URL")
            .and_then(non_empty)
            .or(raw.backend.token_url.and_then(non_empty))
            .unwrap_or(defaults.token_url);

        let request_timeout_secs = match env("PESA_REQUEST_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .with_context(|| format!("PESA_REQUEST_TIMEOUT_SECS must be a number, got '{}'", v))?,
            None => raw
                .backend
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };
        let transaction_limit = match env("PESA_TRANSACTION_LIMIT") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("PESA_TRANSACTION_LIMIT must be a number, got '{}'", v))?,
            None => raw.transactions.limit.unwrap_or(DEFAULT_TRANSACTION_LIMIT),
        };
        if transaction_limit == 0 {
            anyhow::bail!("transaction limit must be at least 1");
        }

        Ok(Self {
            demo_mode,
            api_key,
            functions_url,
            auth_url,
            token_url,
            request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
            transaction_limit,
        })
    }

    /// Save config to the data directory
    ///
    /// Only `app.demoMode` is written. Backend and transaction settings stay
    /// as they are in the file, so environment overrides never land on disk.
    pub fn save(&self, pesa_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(pesa_dir)
            .with_context(|| format!("Failed to create {}", pesa_dir.display()))?;
        let settings_path = pesa_dir.join(SETTINGS_FILE);
        let mut settings = read_settings(&settings_path)?;

        settings.app.demo_mode = self.demo_mode;

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Enable demo mode
    pub fn enable_demo_mode(&mut self) {
        self.demo_mode = true;
    }

    /// Disable demo mode
    pub fn disable_demo_mode(&mut self) {
        self.demo_mode = false;
    }

    /// Connection settings for the live backend
    pub fn http_backend_config(&self) -> Result<HttpBackendConfig> {
        let api_key = self
            .api_key
            .clone()
            .context("No backend API key configured (set PESA_API_KEY or backend.apiKey)")?;
        let functions_url = self.functions_url.clone().context(
            "No functions URL configured (set PESA_FUNCTIONS_URL or backend.functionsUrl)",
        )?;
        Ok(HttpBackendConfig {
            auth_url: self.auth_url.clone(),
            token_url: self.token_url.clone(),
            functions_url,
            api_key,
            timeout: self.request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_with_env(dir.path(), no_env).unwrap();
        assert!(!config.demo_mode);
        assert_eq!(config.transaction_limit, 50);
        assert_eq!(config.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert!(config.http_backend_config().is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"app":{"demoMode":true},"backend":{"apiKey":"from-file","functionsUrl":"https://f.example"},"transactions":{"limit":20}}"#,
        )
        .unwrap();

        let config = Config::load_with_env(dir.path(), |name| match name {
            "PESA_DEMO_MODE" => Some("no".into()),
            "PESA_API_KEY" => Some("from-env".into()),
            "PESA_TRANSACTION_LIMIT" => Some("75".into()),
            _ => None,
        })
        .unwrap();
        assert!(!config.demo_mode);
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.transaction_limit, 75);

        let http = config.http_backend_config().unwrap();
        assert_eq!(http.functions_url, "https://f.example");
    }

    #[test]
    fn test_bad_numeric_env_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = Config::load_with_env(dir.path(), |name| {
            (name == "PESA_TRANSACTION_LIMIT").then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_save_preserves_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            r#"{"app":{"demoMode":false,"theme":"dark"},"experiments":{"newHome":true}}"#,
        )
        .unwrap();

        let mut config = Config::load_with_env(dir.path(), no_env).unwrap();
        config.enable_demo_mode();
        config.save(dir.path()).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["app"]["demoMode"], true);
        assert_eq!(saved["app"]["theme"], "dark");
        assert_eq!(saved["experiments"]["newHome"], true);

        let reloaded = Config::load_with_env(dir.path(), no_env).unwrap();
        assert!(reloaded.demo_mode);
    }

    #[test]
    fn test_save_does_not_persist_env_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{"backend":{"functionsUrl":"https://f.example"}}"#).unwrap();

        let mut config = Config::load_with_env(dir.path(), |name| match name {
            "PESA_API_KEY" => Some("sk-from-env".into()),
            "PESA_FUNCTIONS_URL" => Some("https://override.example".into()),
            "PESA_TRANSACTION_LIMIT" => Some("10".into()),
            "PESA_REQUEST_TIMEOUT_SECS" => Some("5".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-from-env"));
        config.enable_demo_mode();
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("sk-from-env"));
        assert!(!content.contains("override.example"));

        let saved: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(saved["app"]["demoMode"], true);
        assert_eq!(saved["backend"]["functionsUrl"], "https://f.example");
        assert!(saved["backend"].get("apiKey").is_none());
        assert!(saved["transactions"].get("limit").is_none());
        assert!(saved["backend"].get("requestTimeoutSecs").is_none());

        let reloaded = Config::load_with_env(dir.path(), no_env).unwrap();
        assert!(reloaded.api_key.is_none());
        assert_eq!(reloaded.transaction_limit, DEFAULT_TRANSACTION_LIMIT);
    }
}
