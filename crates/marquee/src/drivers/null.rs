//! Inert driver for scenes that need no device control, e.g. a line-in
//! source that is simply "there" once the amplifier input is selected.

use super::{Driver, DriverError};
use crate::catalog::DriverId;
use crate::commands::CommandSpec;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct NullDriver {
    id: DriverId,
    power: AtomicBool,
}

impl NullDriver {
    pub fn new(id: DriverId) -> Self {
        Self {
            id,
            power: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Driver for NullDriver {
    fn id(&self) -> &DriverId {
        &self.id
    }

    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }

    fn power_state(&self) -> bool {
        self.power.load(Ordering::Relaxed)
    }

    async fn set_power(&self, enabled: bool) -> Result<bool, DriverError> {
        self.power.store(enabled, Ordering::Relaxed);
        Ok(enabled)
    }

    async fn send(
        &self,
        command: &str,
        _zone_index: Option<u8>,
        _args: &[String],
    ) -> Result<(), DriverError> {
        Err(DriverError::UnknownCommand {
            driver: self.id.clone(),
            command: command.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_power_tracking() {
        let driver = NullDriver::new(DriverId::new("null1"));
        assert!(!driver.power_state());
        assert!(driver.set_power(true).await.unwrap());
        assert!(driver.power_state());
        assert!(!driver.set_power(false).await.unwrap());
    }

    #[tokio::test]
    async fn test_no_commands() {
        let driver = NullDriver::new(DriverId::new("null1"));
        assert!(driver.commands().is_empty());
        assert!(matches!(
            driver.send("play", None, &[]).await,
            Err(DriverError::UnknownCommand { .. })
        ));
    }
}
