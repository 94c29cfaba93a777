/*
* hostspec Configuration Management
* ---------------------------------
*
* Layered settings, lowest to highest priority:
*
* 1. Hardcoded defaults (below)
* 2. <CONFIG_PATH>/default.toml (optional)
* 3. <CONFIG_PATH>/local.toml (optional, for per-machine overrides)
* 4. Environment variables, HOSTSPEC_ prefix, `__` between section and key
*    (e.g. HOSTSPEC_ALLOCATION__STRICT_ISOLATION=true)
*
* Sections:
* ---------
* - logging: level filter and whether to colour the output
* - catalog: optional TOML file with extra host specs on top of the built-ins
* - allocation: engine behaviour, see AllocationSettings
*/

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub allocation: AllocationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub ansi: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

impl LoggingSettings {
    /// Parsed `level`, or `None` if it is not a tracing level name.
    pub fn max_level(&self) -> Option<Level> {
        self.level.parse().ok()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Extra host specs merged over the built-in presets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSettings {
    /// Fail instead of warning when polite and greedy guests land on the same
    /// physical core.
    #[serde(default)]
    pub strict_isolation: bool,
}

fn builder_with_defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Config::builder()
        .set_default("logging.level", "info")?
        .set_default("logging.ansi", true)?
        .set_default("allocation.strict_isolation", false)
}

fn environment() -> Environment {
    Environment::with_prefix("HOSTSPEC")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());

        info!("Loading configuration from path: {}", config_path);

        builder_with_defaults()?
            .add_source(File::with_name(&format!("{}/default", config_path)).required(false))
            .add_source(File::with_name(&format!("{}/local", config_path)).required(false))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    pub fn new_from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from file: {}", path.display());

        builder_with_defaults()?
            .add_source(File::from(path))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }
}

pub fn generate_default_config() -> Settings {
    Settings {
        logging: LoggingSettings::default(),
        catalog: CatalogSettings {
            path: Some(PathBuf::from("config/catalog.toml")),
        },
        allocation: AllocationSettings::default(),
    }
}
