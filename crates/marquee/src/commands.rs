//! Semantic command vocabulary and per-driver command tables.
//!
//! Every driver command is registered with a semantic type and a declared
//! argument arity. The types feed introspection and UI generation only;
//! the arbitration algorithm never looks at them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Fixed vocabulary of command semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandType {
    PowerOn,
    PowerOff,
    PowerToggle,
    NavigateUp,
    NavigateDown,
    NavigateLeft,
    NavigateRight,
    NavigateEnter,
    NavigateBack,
    NavigateHome,
    NavigateTextInput,
    PlaybackPlay,
    PlaybackPause,
    PlaybackStop,
    PlaybackRewind,
    PlaybackFastForward,
    PlaybackOsd,
    VolumeUp,
    VolumeDown,
    VolumeMute,
    VolumeSet,
    InputSelect,
    AppLaunch,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::PowerOn => "power-on",
            CommandType::PowerOff => "power-off",
            CommandType::PowerToggle => "power-toggle",
            CommandType::NavigateUp => "navigate-up",
            CommandType::NavigateDown => "navigate-down",
            CommandType::NavigateLeft => "navigate-left",
            CommandType::NavigateRight => "navigate-right",
            CommandType::NavigateEnter => "navigate-enter",
            CommandType::NavigateBack => "navigate-back",
            CommandType::NavigateHome => "navigate-home",
            CommandType::NavigateTextInput => "navigate-text-input",
            CommandType::PlaybackPlay => "playback-play",
            CommandType::PlaybackPause => "playback-pause",
            CommandType::PlaybackStop => "playback-stop",
            CommandType::PlaybackRewind => "playback-rewind",
            CommandType::PlaybackFastForward => "playback-fast-forward",
            CommandType::PlaybackOsd => "playback-osd",
            CommandType::VolumeUp => "volume-up",
            CommandType::VolumeDown => "volume-down",
            CommandType::VolumeMute => "volume-mute",
            CommandType::VolumeSet => "volume-set",
            CommandType::InputSelect => "input-select",
            CommandType::AppLaunch => "app-launch",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = UnknownCommandType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s {
            "power-on" => CommandType::PowerOn,
            "power-off" => CommandType::PowerOff,
            "power-toggle" => CommandType::PowerToggle,
            "navigate-up" => CommandType::NavigateUp,
            "navigate-down" => CommandType::NavigateDown,
            "navigate-left" => CommandType::NavigateLeft,
            "navigate-right" => CommandType::NavigateRight,
            "navigate-enter" => CommandType::NavigateEnter,
            "navigate-back" => CommandType::NavigateBack,
            "navigate-home" => CommandType::NavigateHome,
            "navigate-text-input" => CommandType::NavigateTextInput,
            "playback-play" => CommandType::PlaybackPlay,
            "playback-pause" => CommandType::PlaybackPause,
            "playback-stop" => CommandType::PlaybackStop,
            "playback-rewind" => CommandType::PlaybackRewind,
            "playback-fast-forward" => CommandType::PlaybackFastForward,
            "playback-osd" => CommandType::PlaybackOsd,
            "volume-up" => CommandType::VolumeUp,
            "volume-down" => CommandType::VolumeDown,
            "volume-mute" => CommandType::VolumeMute,
            "volume-set" => CommandType::VolumeSet,
            "input-select" => CommandType::InputSelect,
            "app-launch" => CommandType::AppLaunch,
            _ => return Err(UnknownCommandType(s.to_string())),
        };
        Ok(parsed)
    }
}

/// Error for an unrecognized command type string in driver config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommandType(pub String);

impl fmt::Display for UnknownCommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command type: {}", self.0)
    }
}

impl std::error::Error for UnknownCommandType {}

/// Declaration of one registered command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Command name as it appears in routes
    pub command: String,
    /// Semantic type, for introspection/UI only
    pub kind: CommandType,
    /// Number of arguments the command takes
    pub arity: u8,
    /// Readable name
    pub name: String,
    /// Readable description
    pub description: String,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, kind: CommandType) -> Self {
        let command = command.into();
        Self {
            kind,
            arity: 0,
            name: command.clone(),
            description: command.clone(),
            command,
        }
    }

    pub fn with_arity(mut self, arity: u8) -> Self {
        self.arity = arity;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Typed command registry for one driver: spec plus a driver-specific
/// dispatch payload per entry.
#[derive(Debug, Clone)]
pub struct CommandTable<P> {
    entries: BTreeMap<String, (CommandSpec, P)>,
}

impl<P> CommandTable<P> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, spec: CommandSpec, payload: P) {
        self.entries.insert(spec.command.clone(), (spec, payload));
    }

    pub fn get(&self, command: &str) -> Option<(&CommandSpec, &P)> {
        self.entries.get(command).map(|(spec, p)| (spec, p))
    }

    pub fn contains(&self, command: &str) -> bool {
        self.entries.contains_key(command)
    }

    pub fn specs(&self) -> Vec<CommandSpec> {
        self.entries.values().map(|(spec, _)| spec.clone()).collect()
    }

    /// First entry with the given semantic type, if any.
    pub fn find_by_kind(&self, kind: CommandType) -> Option<(&CommandSpec, &P)> {
        self.entries
            .values()
            .find(|(spec, _)| spec.kind == kind)
            .map(|(spec, p)| (spec, p))
    }
}

impl<P> Default for CommandTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_type_round_trip() {
        for kind in [
            CommandType::PowerOn,
            CommandType::NavigateTextInput,
            CommandType::PlaybackFastForward,
            CommandType::InputSelect,
        ] {
            assert_eq!(kind.as_str().parse::<CommandType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_command_type() {
        assert!("warp-speed".parse::<CommandType>().is_err());
    }

    #[test]
    fn test_table_lookup() {
        let mut table: CommandTable<&str> = CommandTable::new();
        table.register(
            CommandSpec::new("up", CommandType::NavigateUp),
            "keypress/Up",
        );
        table.register(
            CommandSpec::new("text", CommandType::NavigateTextInput).with_arity(1),
            "keypress/Lit_",
        );

        let (spec, payload) = table.get("up").unwrap();
        assert_eq!(spec.kind, CommandType::NavigateUp);
        assert_eq!(*payload, "keypress/Up");
        assert_eq!(table.get("text").unwrap().0.arity, 1);
        assert!(!table.contains("select"));
    }

    #[test]
    fn test_find_by_kind() {
        let mut table: CommandTable<u32> = CommandTable::new();
        table.register(CommandSpec::new("on", CommandType::PowerOn), 1);
        table.register(CommandSpec::new("off", CommandType::PowerOff), 2);

        let (spec, payload) = table.find_by_kind(CommandType::PowerOff).unwrap();
        assert_eq!(spec.command, "off");
        assert_eq!(*payload, 2);
        assert!(table.find_by_kind(CommandType::VolumeMute).is_none());
    }
}
