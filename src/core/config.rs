use crate::core::model::{Platform, PriceSnapshot};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoingeckoProviderConfig {
    pub base_url: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    pub coingecko: Option<CoingeckoProviderConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct InsightsConfig {
    /// Breakdown rows beyond this count are merged into "Others".
    #[serde(default = "default_others_threshold")]
    pub others_threshold: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_others_threshold() -> usize {
    10
}

fn default_page_size() -> usize {
    10
}

impl Default for InsightsConfig {
    fn default() -> Self {
        InsightsConfig {
            others_threshold: default_others_threshold(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub platforms: Vec<Platform>,
    /// Static price snapshots, used when no live provider is configured.
    #[serde(default)]
    pub prices: Vec<PriceSnapshot>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub insights: InsightsConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "cryptofolio", "cryptofolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "cryptofolio", "cryptofolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!(
            platforms = config.platforms.len(),
            prices = config.prices.len(),
            "Successfully loaded config"
        );
        Ok(config)
    }
}
