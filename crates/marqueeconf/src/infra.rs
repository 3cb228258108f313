//! Infrastructure configuration - fixed for the lifetime of the process.

use serde::{Deserialize, Serialize};

/// Infrastructure configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct InfraConfig {
    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Network bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BindConfig {
    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
        }
    }
}

fn default_http_port() -> u16 {
    8040
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    /// Log level filter (RUST_LOG syntax)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Deployment-tunable defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefaultsConfig {
    /// Bound on every outbound driver call, in milliseconds. Expiry is
    /// reported as `DriverUnreachable`.
    #[serde(default = "default_driver_timeout_ms")]
    pub driver_timeout_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            driver_timeout_ms: default_driver_timeout_ms(),
        }
    }
}

fn default_driver_timeout_ms() -> u64 {
    5000
}
