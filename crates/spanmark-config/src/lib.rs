use serde::{Deserialize, Serialize};
use spanmark_engine::{BundledImages, ResourceId, Theme};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

fn default_fetch_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Document opened when no file is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_path: Option<PathBuf>,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default)]
    pub theme: Theme,

    /// Bare image references that resolve to a local file without fetching.
    #[serde(default)]
    pub bundled_images: BTreeMap<String, PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            documents_path: None,
            fetch_timeout_secs: default_fetch_timeout(),
            theme: Theme::default(),
            bundled_images: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in every configured path
        config.documents_path = config
            .documents_path
            .map(|path| Self::expand_path(&path).unwrap_or(path));
        for path in config.bundled_images.values_mut() {
            if let Some(expanded) = Self::expand_path(path) {
                *path = expanded;
            }
        }

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/spanmark");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Builds the engine lookup table for `bundled_images`.
    ///
    /// Resource ids index into the returned file list, assigned in name order.
    pub fn bundled_table(&self) -> (BundledImages, Vec<PathBuf>) {
        let mut table = BundledImages::new();
        let mut files = Vec::with_capacity(self.bundled_images.len());
        for (index, (name, path)) in self.bundled_images.iter().enumerate() {
            table.insert(name.clone(), ResourceId(index as u32));
            files.push(path.clone());
        }
        (table, files)
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
