use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the hosted backend, e.g. "https://myproject.example.co"
    #[serde(default)]
    pub backend_url: String,

    /// Publishable API key sent with every request.
    #[serde(default)]
    pub anon_key: String,

    pub email: Option<String>,
    pub password: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            // Write a template the user can fill in
            let config = Config::default();
            config.save()?;
            Err(AppError::Config(format!(
                "created {} - fill in backend_url and anon_key",
                config_path.display()
            )))
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("linkdeck")
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if self.backend_url.is_empty() {
            return Err(AppError::Config("backend_url is not set".to_string()));
        }
        if self.anon_key.is_empty() {
            return Err(AppError::Config("anon_key is not set".to_string()));
        }
        url::Url::parse(&self.backend_url)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_missing_fields() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_malformed_url() {
        let config = Config {
            backend_url: "not a url".to_string(),
            anon_key: "key".to_string(),
            email: None,
            password: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_complete_config() {
        let config = Config {
            backend_url: "https://myproject.example.co".to_string(),
            anon_key: "key".to_string(),
            email: Some("me@example.com".to_string()),
            password: Some("hunter2".to_string()),
        };
        assert!(config.validate().is_ok());
    }
}
