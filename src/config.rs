use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openstack: OpenStackConfig,
    pub rbd: RbdConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenStackConfig {
    /// Catalog interface to use: public, internal or admin
    pub interface: String,
    pub region_name: Option<String>,
    pub timeout_ms: u64,
    pub image_page_size: u32,
}

impl Default for OpenStackConfig {
    fn default() -> Self {
        Self {
            interface: "public".to_string(),
            region_name: None,
            timeout_ms: 60000,
            image_page_size: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RbdConfig {
    pub binary: PathBuf,
}

impl Default for RbdConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("rbd"),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match self.openstack.interface.as_str() {
            "public" | "internal" | "admin" => {}
            other => eyre::bail!("openstack.interface must be public, internal or admin, not {}", other),
        }
        if self.openstack.image_page_size == 0 {
            eyre::bail!("openstack.image_page_size must be positive");
        }
        Ok(())
    }
}
