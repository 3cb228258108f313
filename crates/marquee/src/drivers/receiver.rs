//! Multi-zone AV receiver driver.
//!
//! Controls a receiver through a small REST bridge. Input selection and
//! volume commands are per hardware zone; the zone is chosen by the
//! caller-supplied sub-index (`receiver:2` in a zone declaration) and
//! defaults to zone 1.

use super::{Driver, DriverError};
use crate::catalog::DriverId;
use crate::commands::{CommandSpec, CommandTable, CommandType};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

enum ReceiverAction {
    Input(String),
    Volume(&'static str),
}

pub struct AvReceiverDriver {
    id: DriverId,
    endpoint: String,
    client: reqwest::Client,
    power: AtomicBool,
    zones: u8,
    table: CommandTable<ReceiverAction>,
}

impl AvReceiverDriver {
    pub fn new(
        id: DriverId,
        endpoint: String,
        inputs: &[String],
        zones: u8,
        client: reqwest::Client,
    ) -> Self {
        let mut table = CommandTable::new();
        for input in inputs {
            table.register(
                CommandSpec::new(format!("input-{}", input), CommandType::InputSelect)
                    .with_name(format!("Input {}", input)),
                ReceiverAction::Input(input.clone()),
            );
        }
        table.register(
            CommandSpec::new("volume-up", CommandType::VolumeUp),
            ReceiverAction::Volume("up"),
        );
        table.register(
            CommandSpec::new("volume-down", CommandType::VolumeDown),
            ReceiverAction::Volume("down"),
        );
        table.register(
            CommandSpec::new("volume-mute", CommandType::VolumeMute),
            ReceiverAction::Volume("mute"),
        );

        Self {
            id,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
            power: AtomicBool::new(false),
            zones: zones.max(1),
            table,
        }
    }

    async fn request(&self, path: &str) -> Result<(), DriverError> {
        let url = format!("{}/{}", self.endpoint, path);
        debug!("receiver request: {}", url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| DriverError::Unreachable {
                driver: self.id.clone(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(DriverError::Unreachable {
                driver: self.id.clone(),
                reason: format!("receiver returned {}", response.status()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for AvReceiverDriver {
    fn id(&self) -> &DriverId {
        &self.id
    }

    fn commands(&self) -> Vec<CommandSpec> {
        self.table.specs()
    }

    fn power_state(&self) -> bool {
        self.power.load(Ordering::Relaxed)
    }

    async fn set_power(&self, enabled: bool) -> Result<bool, DriverError> {
        if self.power.load(Ordering::Relaxed) == enabled {
            return Ok(enabled);
        }
        self.request(if enabled { "power/on" } else { "power/off" })
            .await?;
        self.power.store(enabled, Ordering::Relaxed);
        Ok(enabled)
    }

    async fn send(
        &self,
        command: &str,
        zone_index: Option<u8>,
        _args: &[String],
    ) -> Result<(), DriverError> {
        let (_, action) = self
            .table
            .get(command)
            .ok_or_else(|| DriverError::UnknownCommand {
                driver: self.id.clone(),
                command: command.to_string(),
            })?;

        let mut zone = zone_index.unwrap_or(1);
        if zone == 0 || zone > self.zones {
            warn!(
                "receiver {}: zone {} out of range (1..={}), using zone 1",
                self.id, zone, self.zones
            );
            zone = 1;
        }

        match action {
            ReceiverAction::Input(input) => {
                self.request(&format!("zone/{}/input/{}", zone, input)).await
            }
            ReceiverAction::Volume(direction) => {
                self.request(&format!("zone/{}/volume/{}", zone, direction))
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> AvReceiverDriver {
        AvReceiverDriver::new(
            DriverId::new("receiver"),
            "http://av:5000".to_string(),
            &["dvd".to_string(), "cd".to_string()],
            3,
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_input_commands_generated() {
        let driver = driver();
        let specs = driver.commands();
        assert!(specs
            .iter()
            .any(|s| s.command == "input-dvd" && s.kind == CommandType::InputSelect));
        assert!(specs.iter().any(|s| s.command == "input-cd"));
        assert!(specs.iter().any(|s| s.command == "volume-mute"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let driver = driver();
        let err = driver.send("input-phono", Some(1), &[]).await.unwrap_err();
        assert!(matches!(err, DriverError::UnknownCommand { .. }));
    }
}
