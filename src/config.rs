use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

/// Environment variable holding the chat backend base URL.
pub const API_URL_ENV: &str = "FIREFINGERS_API_URL";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default)]
    pub theme: Theme,
}

/// Where the effective base URL came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSource {
    /// `--api-url` or the environment variable (clap merges the two).
    CommandLine,
    ConfigFile,
    Unset,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn save_api_url(url: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.api_url = Some(url.to_string());
        config.save()
    }

    /// Resolves the backend base URL. A missing URL is not an error here;
    /// requests against it fail later through the normal error path.
    pub fn resolve_api_url(&self, cli: Option<&str>) -> (String, UrlSource) {
        if let Some(url) = cli.filter(|u| !u.trim().is_empty()) {
            return (url.trim().to_string(), UrlSource::CommandLine);
        }
        match self.api_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => (url.trim().to_string(), UrlSource::ConfigFile),
            None => (String::new(), UrlSource::Unset),
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("firefingers").join("config.json"))
    }
}
