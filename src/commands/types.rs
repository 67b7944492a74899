//! Vocabulary types

use serde::{Deserialize, Serialize};

/// A built-in command and the phrases that trigger it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    /// Canonical identifier, also the payload sent to the peripheral
    pub id: String,
    /// Trigger phrases in match order
    pub phrases: Vec<String>,
}

impl CommandEntry {
    /// Create an entry from an id and phrase list
    #[must_use]
    pub fn new(id: impl Into<String>, phrases: &[&str]) -> Self {
        Self {
            id: id.into(),
            phrases: phrases.iter().map(ToString::to_string).collect(),
        }
    }
}

/// A user-defined trigger mapped to a literal payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOverride {
    pub trigger: String,
    pub payload: String,
}

/// One row of the vocabulary listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VocabularyRow {
    /// Trigger text as shown to the operator
    pub trigger: String,
    /// Payload that would be sent
    pub payload: String,
    /// Whether the row comes from a user override
    pub user_defined: bool,
}

/// Where a resolution came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchSource {
    /// A user override matched
    Override { trigger: String },
    /// A built-in entry matched via one of its phrases
    Builtin { command: String, phrase: String },
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Payload to send
    pub payload: String,
    /// Which vocabulary entry produced it
    pub source: MatchSource,
}

/// The stock robot command table
#[must_use]
pub fn default_commands() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new("forward", &["forward", "go forward", "straight", "start"]),
        CommandEntry::new("backward", &["backward", "go back", "reverse"]),
        CommandEntry::new("stop", &["stop", "halt", "hold"]),
        CommandEntry::new("left", &["left", "turn left"]),
        CommandEntry::new("right", &["right", "turn right"]),
        CommandEntry::new("ring", &["siren", "sound", "buzzer", "alarm"]),
    ]
}
