//! Mapping recognized gestures to commands for an input-injection backend.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::Gesture;
use crate::error::Result;
use crate::types::Hand;

/// Actions a command sink knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    ZoomIn,
    ZoomOut,
    NextPage,
    PreviousPage,
    ScrollUp,
    ScrollDown,
    RotateRight,
    RotateLeft,
    Click,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZoomIn => "zoom_in",
            Self::ZoomOut => "zoom_out",
            Self::NextPage => "next_page",
            Self::PreviousPage => "previous_page",
            Self::ScrollUp => "scroll_up",
            Self::ScrollDown => "scroll_down",
            Self::RotateRight => "rotate_right",
            Self::RotateLeft => "rotate_left",
            Self::Click => "click",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in command for each gesture.
pub fn default_command(gesture: Gesture) -> Option<Command> {
    match gesture {
        Gesture::Pinch => Some(Command::ZoomOut),
        Gesture::Spread => Some(Command::ZoomIn),
        Gesture::NavLeft => Some(Command::PreviousPage),
        Gesture::NavRight => Some(Command::NextPage),
        Gesture::NavUp => Some(Command::ScrollUp),
        Gesture::NavDown => Some(Command::ScrollDown),
        Gesture::PinchHold => None,
    }
}

/// OS-level input injection backend.
pub trait CommandSink {
    /// Perform `command`. `hand` is the landmark list that triggered it, for
    /// sinks that need the cursor position.
    fn execute(&mut self, command: Command, hand: Option<&Hand>) -> Result<()>;
}

/// Sink that only logs, for dry runs.
#[derive(Debug, Default)]
pub struct LoggingSink {
    pub executed: Vec<Command>,
}

impl CommandSink for LoggingSink {
    fn execute(&mut self, command: Command, _hand: Option<&Hand>) -> Result<()> {
        info!("Command: {}", command);
        self.executed.push(command);
        Ok(())
    }
}

/// Resolves gestures and custom template names to commands.
///
/// Overrides are keyed by gesture label or template name and take precedence
/// over [`default_command`].
#[derive(Debug, Clone, Default)]
pub struct CommandMapper {
    overrides: BTreeMap<String, Command>,
}

impl CommandMapper {
    pub fn new(overrides: &BTreeMap<String, Command>) -> Self {
        Self {
            overrides: overrides.clone(),
        }
    }

    pub fn set_override(&mut self, key: &str, command: Command) {
        self.overrides.insert(key.to_string(), command);
    }

    pub fn resolve(&self, gesture: Gesture) -> Option<Command> {
        self.overrides
            .get(gesture.as_str())
            .copied()
            .or_else(|| default_command(gesture))
    }

    /// Command bound to a custom template, if any.
    pub fn resolve_custom(&self, template: &str) -> Option<Command> {
        self.overrides.get(template).copied()
    }

    /// Resolve and execute. Returns the command that ran, if any.
    pub fn dispatch<S: CommandSink + ?Sized>(
        &self,
        gesture: Gesture,
        hand: Option<&Hand>,
        sink: &mut S,
    ) -> Result<Option<Command>> {
        let Some(command) = self.resolve(gesture) else {
            debug!("No command bound to {}", gesture);
            return Ok(None);
        };
        sink.execute(command, hand)?;
        Ok(Some(command))
    }

    pub fn dispatch_custom<S: CommandSink + ?Sized>(
        &self,
        template: &str,
        hand: Option<&Hand>,
        sink: &mut S,
    ) -> Result<Option<Command>> {
        let Some(command) = self.resolve_custom(template) else {
            debug!("No command bound to template {:?}", template);
            return Ok(None);
        };
        sink.execute(command, hand)?;
        Ok(Some(command))
    }
}
