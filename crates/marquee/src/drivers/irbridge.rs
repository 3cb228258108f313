//! IR blaster driver, speaking to an IR-over-HTTP bridge.
//!
//! Commands are named IR sequences from config. A sequence token that is
//! all decimal digits is a delay in milliseconds rather than an IR code,
//! so a config can express things like `off,200,off` for stubborn gear.
//!
//! Power management only happens when the config declares commands typed
//! `power-on` and `power-off`; without them the driver just tracks the
//! requested state.

use super::{Driver, DriverError};
use crate::catalog::DriverId;
use crate::commands::{CommandSpec, CommandTable, CommandType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use marqueeconf::IrCommandConfig;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrToken {
    Code(String),
    DelayMs(u64),
}

/// Parse a comma-separated sequence; digit-only tokens become delays.
pub fn parse_sequence(raw: &str) -> Vec<IrToken> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            if token.chars().all(|c| c.is_ascii_digit()) {
                IrToken::DelayMs(token.parse().unwrap_or(0))
            } else {
                IrToken::Code(token.to_string())
            }
        })
        .collect()
}

pub struct IrBridgeDriver {
    id: DriverId,
    endpoint: String,
    client: reqwest::Client,
    power: AtomicBool,
    table: CommandTable<Vec<IrToken>>,
    power_on: Option<Vec<IrToken>>,
    power_off: Option<Vec<IrToken>>,
}

impl IrBridgeDriver {
    pub fn from_config(
        id: DriverId,
        endpoint: String,
        commands: &BTreeMap<String, IrCommandConfig>,
        client: reqwest::Client,
    ) -> Result<Self> {
        let mut table = CommandTable::new();
        let mut power_on = None;
        let mut power_off = None;

        for (name, command) in commands {
            let kind: CommandType = command
                .command_type
                .parse()
                .with_context(|| format!("command {}", name))?;
            let sequence = parse_sequence(command.sequence.as_deref().unwrap_or(name));

            if kind == CommandType::PowerOn {
                power_on = Some(sequence.clone());
            }
            if kind == CommandType::PowerOff {
                power_off = Some(sequence.clone());
            }

            let mut spec = CommandSpec::new(name.clone(), kind);
            if let Some(display) = &command.name {
                spec = spec.with_name(display.clone());
            }
            if let Some(description) = &command.description {
                spec = spec.with_description(description.clone());
            }
            table.register(spec, sequence);
        }

        Ok(Self {
            id,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
            power: AtomicBool::new(false),
            table,
            power_on,
            power_off,
        })
    }

    async fn play(&self, sequence: &[IrToken]) -> Result<(), DriverError> {
        for token in sequence {
            match token {
                IrToken::DelayMs(ms) => {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                }
                IrToken::Code(code) => {
                    let url = format!("{}/write/{}", self.endpoint, code);
                    debug!("ir write: {}", url);
                    let response = self.client.get(&url).send().await.map_err(|e| {
                        DriverError::Unreachable {
                            driver: self.id.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    if !response.status().is_success() {
                        return Err(DriverError::Unreachable {
                            driver: self.id.clone(),
                            reason: format!("bridge returned {} for {}", response.status(), code),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for IrBridgeDriver {
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

        let sequence = if enabled {
            &self.power_on
        } else {
            &self.power_off
        };
        match sequence {
            Some(sequence) => self.play(sequence).await?,
            None => warn!(
                "ir-bridge {}: no power-{} sequence configured, tracking state only",
                self.id,
                if enabled { "on" } else { "off" }
            ),
        }

        self.power.store(enabled, Ordering::Relaxed);
        Ok(enabled)
    }

    async fn send(
        &self,
        command: &str,
        _zone_index: Option<u8>,
        _args: &[String],
    ) -> Result<(), DriverError> {
        let (_, sequence) = self
            .table
            .get(command)
            .ok_or_else(|| DriverError::UnknownCommand {
                driver: self.id.clone(),
                command: command.to_string(),
            })?;
        self.play(sequence).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(entries: &[(&str, &str, Option<&str>)]) -> BTreeMap<String, IrCommandConfig> {
        entries
            .iter()
            .map(|(name, kind, sequence)| {
                (
                    name.to_string(),
                    IrCommandConfig {
                        command_type: kind.to_string(),
                        sequence: sequence.map(String::from),
                        name: None,
                        description: None,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(
            parse_sequence("off,200,off"),
            vec![
                IrToken::Code("off".to_string()),
                IrToken::DelayMs(200),
                IrToken::Code("off".to_string()),
            ]
        );
        assert_eq!(parse_sequence("on"), vec![IrToken::Code("on".to_string())]);
    }

    #[test]
    fn test_power_sequences_captured() {
        let commands = config(&[
            ("on", "power-on", None),
            ("off", "power-off", Some("off,200,off")),
            ("input-hdmi1", "input-select", None),
        ]);
        let driver = IrBridgeDriver::from_config(
            DriverId::new("tv"),
            "http://bridge:5001".to_string(),
            &commands,
            reqwest::Client::new(),
        )
        .unwrap();

        assert_eq!(driver.power_on, Some(vec![IrToken::Code("on".to_string())]));
        assert_eq!(driver.power_off.as_ref().unwrap().len(), 3);
        assert!(driver.table.contains("input-hdmi1"));
    }

    #[test]
    fn test_bad_command_type_rejected() {
        let commands = config(&[("on", "warp-speed", None)]);
        let result = IrBridgeDriver::from_config(
            DriverId::new("tv"),
            "http://bridge:5001".to_string(),
            &commands,
            reqwest::Client::new(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_power_without_sequences_tracks_state() {
        let driver = IrBridgeDriver::from_config(
            DriverId::new("screen"),
            "http://bridge:5001".to_string(),
            &BTreeMap::new(),
            reqwest::Client::new(),
        )
        .unwrap();

        assert!(!driver.power_state());
        assert!(driver.set_power(true).await.unwrap());
        assert!(driver.power_state());
        // Idempotent
        assert!(driver.set_power(true).await.unwrap());
    }
}
