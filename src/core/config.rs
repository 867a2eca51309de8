use crate::core::conversion::{
    DEFAULT_COMPARISON_CURRENCIES, DEFAULT_SOURCE_CURRENCY, DEFAULT_TARGET_CURRENCY,
};
use crate::core::currency::CurrencyCode;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const API_KEY_ENV: &str = "XCONV_API_KEY";
pub const DEFAULT_CURRENCIES: [&str; 5] = ["USD", "INR", "EUR", "GBP", "TON"];

fn codes(list: &[&'static str]) -> Vec<CurrencyCode> {
    list.iter().copied().map(CurrencyCode::from_static).collect()
}

fn default_source_currency() -> CurrencyCode {
    CurrencyCode::from_static(DEFAULT_SOURCE_CURRENCY)
}

fn default_target_currency() -> CurrencyCode {
    CurrencyCode::from_static(DEFAULT_TARGET_CURRENCY)
}

fn default_currencies() -> Vec<CurrencyCode> {
    codes(&DEFAULT_CURRENCIES)
}

fn default_comparison_currencies() -> Vec<CurrencyCode> {
    codes(&DEFAULT_COMPARISON_CURRENCIES)
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub exchangerate_api: Option<ExchangeRateApiConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            exchangerate_api: Some(ExchangeRateApiConfig {
                base_url: "https://v6.exchangerate-api.com".to_string(),
                api_key: None,
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "default_source_currency")]
    pub source_currency: CurrencyCode,
    #[serde(default = "default_target_currency")]
    pub target_currency: CurrencyCode,
    /// Currencies offered for selection and as favorites.
    #[serde(default = "default_currencies")]
    pub currencies: Vec<CurrencyCode>,
    #[serde(default = "default_comparison_currencies")]
    pub comparison_currencies: Vec<CurrencyCode>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            source_currency: default_source_currency(),
            target_currency: default_target_currency(),
            currencies: default_currencies(),
            comparison_currencies: default_comparison_currencies(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, falling back to defaults
    /// when no file has been set up yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "xconv", "xconv")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// API key for exchangerate-api.com. The environment wins over the file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                self.providers
                    .exchangerate_api
                    .as_ref()
                    .and_then(|p| p.api_key.clone())
            })
    }
}
