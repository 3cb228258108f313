//! Driver abstraction and registry.
//!
//! A driver is the capability-abstracted control surface for one physical
//! device. Drivers expose power control, a typed named-command table, and
//! optionally an extra-parameter hook; everything protocol-specific stays
//! inside the concrete implementations.

mod irbridge;
mod null;
mod receiver;
mod roku;

pub use irbridge::IrBridgeDriver;
pub use null::NullDriver;
pub use receiver::AvReceiverDriver;
pub use roku::RokuDriver;

use crate::catalog::DriverId;
use crate::commands::CommandSpec;
use anyhow::{Context, Result};
use async_trait::async_trait;
use marqueeconf::{CatalogConfig, DriverKind};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failures originating at the driver layer.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver {driver} has no command {command}")]
    UnknownCommand { driver: DriverId, command: String },

    #[error("driver {driver} does not accept extra parameters")]
    UnsupportedOperation { driver: DriverId },

    #[error("driver {driver} unreachable: {reason}")]
    Unreachable { driver: DriverId, reason: String },

    #[error("command {command} on driver {driver} expects {expected} arguments, got {got}")]
    BadArgumentCount {
        driver: DriverId,
        command: String,
        expected: u8,
        got: usize,
    },
}

impl DriverError {
    /// The driver the failure originated at.
    pub fn driver(&self) -> &DriverId {
        match self {
            DriverError::UnknownCommand { driver, .. }
            | DriverError::UnsupportedOperation { driver }
            | DriverError::Unreachable { driver, .. }
            | DriverError::BadArgumentCount { driver, .. } => driver,
        }
    }
}

/// Control surface for one physical device.
///
/// All outbound calls are bounded by the configured driver timeout;
/// expiry surfaces as [`DriverError::Unreachable`].
#[async_trait]
pub trait Driver: Send + Sync {
    fn id(&self) -> &DriverId;

    /// Declared command table, for introspection and UI generation.
    fn commands(&self) -> Vec<CommandSpec>;

    /// Last known power state.
    fn power_state(&self) -> bool;

    fn supports_extras(&self) -> bool {
        false
    }

    /// Idempotent power transition. Returns the achieved state.
    async fn set_power(&self, enabled: bool) -> Result<bool, DriverError>;

    /// Execute one registered command.
    async fn send(
        &self,
        command: &str,
        zone_index: Option<u8>,
        args: &[String],
    ) -> Result<(), DriverError>;

    /// Apply scene extras. Drivers without extra-parameter behavior keep
    /// the default.
    async fn apply_extras(&self, _extras: &BTreeMap<String, String>) -> Result<(), DriverError> {
        Err(DriverError::UnsupportedOperation {
            driver: self.id().clone(),
        })
    }
}

/// Owns every driver handle for the process lifetime, looked up by id.
/// Holds no business logic beyond dispatch.
pub struct DriverRegistry {
    drivers: HashMap<DriverId, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, driver: Arc<dyn Driver>) {
        self.drivers.insert(driver.id().clone(), driver);
    }

    pub fn get(&self, id: &DriverId) -> Option<Arc<dyn Driver>> {
        self.drivers.get(id).cloned()
    }

    pub fn contains(&self, id: &DriverId) -> bool {
        self.drivers.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DriverId, &Arc<dyn Driver>)> {
        self.drivers.iter()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Construct every declared driver from validated config.
pub fn build_registry(config: &CatalogConfig, timeout: Duration) -> Result<DriverRegistry> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let mut registry = DriverRegistry::new();
    for (id, driver) in &config.drivers {
        let driver_id = DriverId::new(id);
        let endpoint = || {
            driver
                .endpoint
                .clone()
                .with_context(|| format!("driver {} requires an endpoint", id))
        };
        let handle: Arc<dyn Driver> = match driver.kind {
            DriverKind::Roku => Arc::new(RokuDriver::new(
                driver_id,
                endpoint()?,
                driver.apps.clone(),
                client.clone(),
            )),
            DriverKind::IrBridge => Arc::new(
                IrBridgeDriver::from_config(driver_id, endpoint()?, &driver.commands, client.clone())
                    .with_context(|| format!("driver {} has invalid commands", id))?,
            ),
            DriverKind::AvReceiver => Arc::new(AvReceiverDriver::new(
                driver_id,
                endpoint()?,
                &driver.inputs,
                driver.zones,
                client.clone(),
            )),
            DriverKind::Null => Arc::new(NullDriver::new(driver_id)),
        };
        registry.insert(handle);
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_registry_from_config() {
        let config: marqueeconf::MarqueeConfig = toml::from_str(
            r#"
[drivers.roku]
kind = "roku"
endpoint = "http://roku:8060"

[drivers.spotify]
kind = "null"

[drivers.tv]
kind = "ir-bridge"
endpoint = "http://bridge:5001"

[drivers.tv.commands.on]
type = "power-on"

[drivers.receiver]
kind = "av-receiver"
endpoint = "http://av:5000"
inputs = ["dvd"]
zones = 3
"#,
        )
        .unwrap();

        let registry =
            build_registry(&config.catalog, Duration::from_millis(500)).unwrap();
        assert_eq!(registry.len(), 4);
        assert!(registry.contains(&DriverId::new("roku")));
        assert!(registry.get(&DriverId::new("ghost")).is_none());
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        let config: marqueeconf::MarqueeConfig = toml::from_str(
            r#"
[drivers.roku]
kind = "roku"
"#,
        )
        .unwrap();

        assert!(build_registry(&config.catalog, Duration::from_millis(500)).is_err());
    }
}
