//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, InfraConfig, MarqueeConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // System config
    let system = PathBuf::from("/etc/marquee/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("marquee/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    // Local override (current directory)
    let local = PathBuf::from("marquee.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<MarqueeConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge two configs, with `overlay` taking precedence.
///
/// Infra fields win when they differ from the defaults; catalog tables
/// merge per entry so a local file can add a scene without restating the
/// whole installation.
pub fn merge_configs(base: MarqueeConfig, overlay: MarqueeConfig) -> MarqueeConfig {
    let defaults = InfraConfig::default();
    let mut merged = base;

    if overlay.infra.bind.http_port != defaults.bind.http_port {
        merged.infra.bind.http_port = overlay.infra.bind.http_port;
    }
    if overlay.infra.telemetry.log_level != defaults.telemetry.log_level {
        merged.infra.telemetry.log_level = overlay.infra.telemetry.log_level;
    }
    if overlay.infra.defaults.driver_timeout_ms != defaults.defaults.driver_timeout_ms {
        merged.infra.defaults.driver_timeout_ms = overlay.infra.defaults.driver_timeout_ms;
    }

    merged.catalog.drivers.extend(overlay.catalog.drivers);
    merged.catalog.scenes.extend(overlay.catalog.scenes);
    merged.catalog.zones.extend(overlay.catalog.zones);
    merged.catalog.routes.extend(overlay.catalog.routes);

    merged
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut MarqueeConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("MARQUEE_HTTP_PORT") {
        if let Ok(port) = v.parse() {
            config.infra.bind.http_port = port;
            sources.env_overrides.push("MARQUEE_HTTP_PORT".to_string());
        }
    }

    if let Ok(v) = env::var("MARQUEE_LOG_LEVEL") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("MARQUEE_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Ok(v) = env::var("RUST_LOG") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }

    if let Ok(v) = env::var("MARQUEE_DRIVER_TIMEOUT_MS") {
        if let Ok(timeout) = v.parse() {
            config.infra.defaults.driver_timeout_ms = timeout;
            sources
                .env_overrides
                .push("MARQUEE_DRIVER_TIMEOUT_MS".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[bind]
http_port = 9000

[drivers.amp]
kind = "null"

[zones.den]
audio = "amp"
"#
        )
        .unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.infra.bind.http_port, 9000);
        assert_eq!(config.infra.telemetry.log_level, "info");
        assert!(config.catalog.drivers.contains_key("amp"));
        assert_eq!(config.catalog.zones["den"].audio.as_deref(), Some("amp"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_from_file(Path::new("/nonexistent/marquee.toml"));
        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base: MarqueeConfig = toml::from_str(
            r#"
[bind]
http_port = 9000

[drivers.amp]
kind = "null"
"#,
        )
        .unwrap();
        let overlay: MarqueeConfig = toml::from_str(
            r#"
[telemetry]
log_level = "debug"

[drivers.tv]
kind = "ir-bridge"
endpoint = "http://bridge:5001"
"#,
        )
        .unwrap();

        let merged = merge_configs(base, overlay);
        assert_eq!(merged.infra.bind.http_port, 9000);
        assert_eq!(merged.infra.telemetry.log_level, "debug");
        assert!(merged.catalog.drivers.contains_key("amp"));
        assert!(merged.catalog.drivers.contains_key("tv"));
    }

    #[test]
    fn test_full_catalog_parses() {
        let toml = r#"
[defaults]
driver_timeout_ms = 2500

[drivers.receiver]
kind = "av-receiver"
endpoint = "http://av:5000"
inputs = ["dvd", "cd", "dvr", "cbl", "mdcdr"]
zones = 3

[drivers.tv]
kind = "ir-bridge"
endpoint = "http://bridge:5001"

[drivers.tv.commands.on]
type = "power-on"
sequence = "on"

[drivers.tv.commands.off]
type = "power-off"
sequence = "off,200,off"

[drivers.tv.commands.input-hdmi1]
type = "input-select"

[drivers.roku]
kind = "roku"
endpoint = "http://roku:8060"

[scenes.netflix]
driver = "roku"
driver-extras = "app=netflix"
name = "NetFlix"
description = "Watch movies and TV series"
audio = true
video = true
ux-hint = "category=video,icon=netflix"

[zones.livingroom]
name = "Livingroom"
subzone-default = "tv"

[zones.livingroom.subzones.tv]
name = "TV"
audio = "receiver:1"
video = "tv"

[zones.kitchen]
name = "Kitchen"
audio = "receiver:2"

[[routes.netflix.audio-video]]
steps = [
    { driver = "tv", commands = ["input-hdmi1"] },
    { driver = "receiver", commands = ["input-dvd"] },
]

[[routes.netflix.audio]]
steps = [{ driver = "receiver", commands = ["input-dvd"] }]
"#;
        let config: MarqueeConfig = toml::from_str(toml).unwrap();
        config.catalog.validate().unwrap();

        assert_eq!(config.infra.defaults.driver_timeout_ms, 2500);
        let zone = &config.catalog.zones["livingroom"];
        assert_eq!(zone.subzone_default.as_deref(), Some("tv"));
        assert_eq!(zone.subzones["tv"].video.as_deref(), Some("tv"));
        let routes = &config.catalog.routes["netflix"];
        assert_eq!(routes.audio_video.len(), 1);
        assert_eq!(routes.audio_video[0].steps[0].driver, "tv");
    }
}
