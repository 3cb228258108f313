//! Power management derived from reference counts.
//!
//! A driver should be powered exactly while some active zone references
//! it. Power-on happens before a freshly referenced driver receives
//! commands; power-off is a best-effort sweep - a device that ignores its
//! power-off is a hardware problem, not a control-plane inconsistency.

use crate::catalog::DriverId;
use crate::drivers::{DriverError, DriverRegistry};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct PowerManager {
    registry: Arc<DriverRegistry>,
}

impl PowerManager {
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self { registry }
    }

    /// Power on every listed driver, in order. Fails fast: command
    /// execution must not start on a driver whose power-on failed.
    pub async fn ensure_on(&self, drivers: &[DriverId]) -> Result<(), DriverError> {
        for id in drivers {
            let Some(driver) = self.registry.get(id) else {
                warn!("power-on skipped, driver {} not registered", id);
                continue;
            };
            if !driver.power_state() {
                debug!("powering on {}", id);
                driver.set_power(true).await?;
            }
        }
        Ok(())
    }

    /// Power off every listed driver. Failures are logged and never
    /// escalate.
    pub async fn sweep(&self, drivers: &[DriverId]) {
        for id in drivers {
            let Some(driver) = self.registry.get(id) else {
                continue;
            };
            if driver.power_state() {
                debug!("powering off {}", id);
                if let Err(e) = driver.set_power(false).await {
                    warn!("power-off of {} failed: {}", id, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::NullDriver;

    fn setup() -> (Arc<DriverRegistry>, PowerManager) {
        let mut registry = DriverRegistry::new();
        registry.insert(Arc::new(NullDriver::new(DriverId::new("amp"))));
        registry.insert(Arc::new(NullDriver::new(DriverId::new("tv"))));
        let registry = Arc::new(registry);
        let power = PowerManager::new(registry.clone());
        (registry, power)
    }

    #[tokio::test]
    async fn test_ensure_on_and_sweep() {
        let (registry, power) = setup();
        let amp = DriverId::new("amp");
        let tv = DriverId::new("tv");

        power.ensure_on(&[amp.clone(), tv.clone()]).await.unwrap();
        assert!(registry.get(&amp).unwrap().power_state());
        assert!(registry.get(&tv).unwrap().power_state());

        power.sweep(&[amp.clone()]).await;
        assert!(!registry.get(&amp).unwrap().power_state());
        assert!(registry.get(&tv).unwrap().power_state());
    }

    #[tokio::test]
    async fn test_unregistered_driver_skipped() {
        let (_, power) = setup();
        // Must not panic or fail
        power.ensure_on(&[DriverId::new("ghost")]).await.unwrap();
        power.sweep(&[DriverId::new("ghost")]).await;
    }
}
