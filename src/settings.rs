use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};

pub const API_URL_ENV: &str = "LEDGERPORT_API_URL";
pub const API_TOKEN_ENV: &str = "LEDGERPORT_API_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_true")]
    pub has_header_row: bool,
}

fn default_poll_interval_ms() -> u64 {
    1500
}

fn default_date_format() -> String {
    "MM/DD/YYYY".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_token: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            date_format: default_date_format(),
            has_header_row: true,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Environment variables win over the file.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(token) = lookup(API_TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_token = token;
        }
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.api_url.trim().is_empty()
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ledgerport")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings_from(path: &Path) -> Settings {
    if path.exists() {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

/// File settings with the environment applied on top.
pub fn effective_settings() -> Settings {
    load_settings().with_env_overrides(|key| std::env::var(key).ok())
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ImportError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&settings_path(), settings)
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            api_url: "https://books.example.com/api".to_string(),
            api_token: "tok".to_string(),
            poll_interval_ms: 500,
            date_format: "YYYY-MM-DD".to_string(),
            has_header_row: false,
        };
        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path), settings);
        assert!(std::fs::read_to_string(&path).unwrap().ends_with("}\n"));
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_from(&dir.path().join("nope.json"));
        assert_eq!(s, Settings::default());
        assert_eq!(s.poll_interval(), Duration::from_millis(1500));
        assert!(!s.is_configured());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"api_url": "http://localhost:8080"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.api_url, "http://localhost:8080");
        assert_eq!(s.date_format, "MM/DD/YYYY");
        assert!(s.has_header_row);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(load_settings_from(&path), Settings::default());
    }

    #[test]
    fn test_save_creates_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("nested").join("settings.json");
        save_settings_to(&path, &Settings::default()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let file = Settings {
            api_url: "http://file".to_string(),
            api_token: "file-token".to_string(),
            ..Settings::default()
        };
        let s = file.clone().with_env_overrides(|key| match key {
            API_URL_ENV => Some("http://env".to_string()),
            API_TOKEN_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(s.api_url, "http://env");
        assert_eq!(s.api_token, "file-token");
    }
}
