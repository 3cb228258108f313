//! Roku streaming box driver.
//!
//! Talks to one Roku device over its REST keypress protocol. Discovery is
//! deliberately not used: a home may contain more than one device, so the
//! driver is always directed at a specific box.
//!
//! Roku has no real power control; "off" navigates home so nothing keeps
//! streaming when no one is watching. Extras select the app to launch:
//! `appid=N` launches directly, `app=NAME` matches case-insensitively
//! against the configured app table.

use super::{Driver, DriverError};
use crate::catalog::DriverId;
use crate::commands::{CommandSpec, CommandTable, CommandType};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

enum RokuAction {
    Keypress(&'static str),
    Text,
}

pub struct RokuDriver {
    id: DriverId,
    base: String,
    client: reqwest::Client,
    power: AtomicBool,
    apps: BTreeMap<String, u32>,
    table: CommandTable<RokuAction>,
}

impl RokuDriver {
    pub fn new(
        id: DriverId,
        endpoint: String,
        apps: BTreeMap<String, u32>,
        client: reqwest::Client,
    ) -> Self {
        let mut table = CommandTable::new();
        let keypresses = [
            ("up", CommandType::NavigateUp, "Up"),
            ("down", CommandType::NavigateDown, "Down"),
            ("left", CommandType::NavigateLeft, "Left"),
            ("right", CommandType::NavigateRight, "Right"),
            ("select", CommandType::NavigateEnter, "Select"),
            ("back", CommandType::NavigateBack, "Back"),
            ("home", CommandType::NavigateHome, "Home"),
            ("info", CommandType::PlaybackOsd, "Info"),
            ("play", CommandType::PlaybackPlay, "Play"),
            ("rewind", CommandType::PlaybackRewind, "Rev"),
            ("forward", CommandType::PlaybackFastForward, "Fwd"),
        ];
        for (name, kind, key) in keypresses {
            table.register(CommandSpec::new(name, kind), RokuAction::Keypress(key));
        }
        table.register(
            CommandSpec::new("text", CommandType::NavigateTextInput).with_arity(1),
            RokuAction::Text,
        );

        Self {
            id,
            base: endpoint.trim_end_matches('/').to_string(),
            client,
            power: AtomicBool::new(false),
            apps,
            table,
        }
    }

    async fn keypress(&self, key: &str) -> Result<(), DriverError> {
        let url = format!("{}/keypress/{}", self.base, key);
        debug!("roku keypress: {}", url);
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
                reason: format!("keypress returned {}", response.status()),
            });
        }
        Ok(())
    }

    async fn launch_app(&self, app_id: u32) -> Result<(), DriverError> {
        let url = format!("{}/launch/{}", self.base, app_id);
        debug!("roku launch: {}", url);
        self.client
            .post(&url)
            .send()
            .await
            .map_err(|e| DriverError::Unreachable {
                driver: self.id.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Case-insensitive substring match against the configured app table.
    fn find_app(&self, needle: &str) -> Option<u32> {
        let needle = needle.to_lowercase();
        self.apps
            .iter()
            .find(|(name, _)| name.to_lowercase().contains(&needle))
            .map(|(_, id)| *id)
    }
}

#[async_trait]
impl Driver for RokuDriver {
    fn id(&self) -> &DriverId {
        &self.id
    }

    fn commands(&self) -> Vec<CommandSpec> {
        self.table.specs()
    }

    fn power_state(&self) -> bool {
        self.power.load(Ordering::Relaxed)
    }

    fn supports_extras(&self) -> bool {
        true
    }

    async fn set_power(&self, enabled: bool) -> Result<bool, DriverError> {
        if self.power.load(Ordering::Relaxed) == enabled {
            return Ok(enabled);
        }
        if !enabled {
            // No real power control; go home so nothing keeps streaming.
            self.keypress("Home").await?;
        }
        self.power.store(enabled, Ordering::Relaxed);
        Ok(enabled)
    }

    async fn send(
        &self,
        command: &str,
        _zone_index: Option<u8>,
        args: &[String],
    ) -> Result<(), DriverError> {
        let (spec, action) = self
            .table
            .get(command)
            .ok_or_else(|| DriverError::UnknownCommand {
                driver: self.id.clone(),
                command: command.to_string(),
            })?;
        if args.len() != spec.arity as usize {
            return Err(DriverError::BadArgumentCount {
                driver: self.id.clone(),
                command: command.to_string(),
                expected: spec.arity,
                got: args.len(),
            });
        }

        match action {
            RokuAction::Keypress(key) => self.keypress(key).await,
            RokuAction::Text => {
                for ch in args[0].chars() {
                    let key = match ch {
                        '\r' | '\n' => "Enter".to_string(),
                        '\u{8}' => "Backspace".to_string(),
                        other => format!("Lit_{}", other),
                    };
                    self.keypress(&key).await?;
                }
                Ok(())
            }
        }
    }

    async fn apply_extras(&self, extras: &BTreeMap<String, String>) -> Result<(), DriverError> {
        if let Some(raw) = extras.get("appid") {
            match raw.parse() {
                Ok(app_id) => return self.launch_app(app_id).await,
                Err(_) => {
                    warn!("roku {}: bad appid extra {:?}", self.id, raw);
                    return Ok(());
                }
            }
        }
        if let Some(name) = extras.get("app") {
            match self.find_app(name) {
                Some(app_id) => return self.launch_app(app_id).await,
                None => {
                    warn!("roku {}: no configured app matches {:?}", self.id, name);
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> RokuDriver {
        let mut apps = BTreeMap::new();
        apps.insert("Netflix".to_string(), 12);
        apps.insert("Amazon Prime Video".to_string(), 13);
        RokuDriver::new(
            DriverId::new("roku"),
            "http://roku:8060/".to_string(),
            apps,
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_command_table() {
        let driver = driver();
        let specs = driver.commands();
        assert!(specs.iter().any(|s| s.command == "up"));
        let text = specs.iter().find(|s| s.command == "text").unwrap();
        assert_eq!(text.arity, 1);
        assert_eq!(text.kind, CommandType::NavigateTextInput);
    }

    #[test]
    fn test_find_app() {
        let driver = driver();
        assert_eq!(driver.find_app("netflix"), Some(12));
        assert_eq!(driver.find_app("amazon"), Some(13));
        assert_eq!(driver.find_app("hulu"), None);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let driver = driver();
        let err = driver.send("warp", None, &[]).await.unwrap_err();
        assert!(matches!(err, DriverError::UnknownCommand { .. }));
    }

    #[tokio::test]
    async fn test_text_requires_argument() {
        let driver = driver();
        let err = driver.send("text", None, &[]).await.unwrap_err();
        assert!(matches!(err, DriverError::BadArgumentCount { .. }));
    }
}
