//! Command domain types
//!
//! Commands are out-of-band instructions targeting a job. The executor
//! drains them at the start of every pulse it runs as primary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Unknown,
    Cancel,
    Pause,
    Resume,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Unknown => "unknown",
            CommandKind::Cancel => "cancel",
            CommandKind::Pause => "pause",
            CommandKind::Resume => "resume",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "cancel" => CommandKind::Cancel,
            "pause" => CommandKind::Pause,
            "resume" => CommandKind::Resume,
            _ => CommandKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    /// Urn of the targeted job
    pub urn: String,
    pub username: String,
}

impl Command {
    pub fn cancel(urn: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::Cancel,
            urn: urn.into(),
            username: username.into(),
        }
    }
}
