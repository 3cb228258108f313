//! Minimal configuration loading for Marquee.
//!
//! This crate provides configuration loading with minimal dependencies,
//! designed to be imported by all Marquee crates without causing
//! circular dependency issues.
//!
//! # Configuration Philosophy
//!
//! Configuration is split into two categories:
//!
//! - **Infrastructure** (`InfraConfig`): Things that physically cannot change
//!   at runtime - bind addresses, log levels, driver timeouts.
//!
//! - **Catalog** (`CatalogConfig`): The static description of the installation -
//!   drivers, scenes, zones, and routes. Validated once at load; the daemon
//!   treats it as immutable afterwards.
//!
//! # Usage
//!
//! ```rust,no_run
//! use marqueeconf::MarqueeConfig;
//!
//! let config = MarqueeConfig::load().expect("Failed to load config");
//!
//! println!("HTTP port: {}", config.infra.bind.http_port);
//! for (id, scene) in &config.catalog.scenes {
//!     println!("Scene {}: driver {}", id, scene.driver);
//! }
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/marquee/config.toml` (system)
//! 2. `~/.config/marquee/config.toml` (user)
//! 3. `./marquee.toml` (local override)
//! 4. Environment variables (`MARQUEE_*`)
//!
//! # Example Config
//!
//! ```toml
//! [bind]
//! http_port = 8040
//!
//! [telemetry]
//! log_level = "info"
//!
//! [defaults]
//! driver_timeout_ms = 5000
//!
//! [drivers.receiver]
//! kind = "av-receiver"
//! endpoint = "http://av.example.net:5000"
//! inputs = ["dvd", "cd", "dvr", "cbl", "mdcdr"]
//! zones = 3
//!
//! [drivers.roku]
//! kind = "roku"
//! endpoint = "http://roku.example.net:8060"
//!
//! [scenes.netflix]
//! driver = "roku"
//! driver-extras = "app=netflix"
//! name = "Netflix"
//! audio = true
//! video = true
//!
//! [zones.kitchen]
//! name = "Kitchen"
//! audio = "receiver:2"
//!
//! [[routes.netflix.audio-video]]
//! steps = [
//!     { driver = "tv", commands = ["input-hdmi1"] },
//!     { driver = "receiver", commands = ["input-dvd"] },
//! ]
//! ```

pub mod catalog;
pub mod infra;
pub mod loader;

pub use catalog::{
    CatalogConfig, DriverConfig, DriverKind, IrCommandConfig, RouteConfig, RouteStepConfig,
    SceneConfig, SceneRoutesConfig, SubzoneConfig, ValidationError, ZoneConfig,
};
pub use infra::{BindConfig, DefaultsConfig, InfraConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Complete Marquee configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MarqueeConfig {
    /// Infrastructure - cannot change at runtime.
    #[serde(flatten)]
    pub infra: InfraConfig,

    /// Catalog - drivers, scenes, zones, routes.
    #[serde(flatten, default)]
    pub catalog: CatalogConfig,
}

impl MarqueeConfig {
    /// Load config from standard locations, apply env overrides, and validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_override(None).map(|(config, _)| config)
    }

    /// Load config with an optional CLI-provided path, returning the sources used.
    pub fn load_with_override(
        cli_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = MarqueeConfig::default();

        for path in loader::discover_config_files_with_override(cli_path) {
            let loaded = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, loaded);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);
        config.catalog.validate()?;

        Ok((config, sources))
    }
}
