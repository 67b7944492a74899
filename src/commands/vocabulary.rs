//! Vocabulary store: built-in command table plus user overrides

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::types::{CommandEntry, UserOverride, VocabularyRow, default_commands};
use crate::{Error, Result};

/// Vocabulary shared between the dispatcher and the API
pub type SharedVocabulary = Arc<RwLock<Vocabulary>>;

/// Built-in commands and user overrides
///
/// Built-ins are fixed at construction. Overrides are keyed by their trimmed
/// trigger; re-adding a trigger replaces its payload in place.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    builtins: Vec<CommandEntry>,
    overrides: Vec<UserOverride>,
    version: u64,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            builtins: default_commands(),
            overrides: Vec::new(),
            version: 0,
        }
    }
}

impl Vocabulary {
    /// Create a vocabulary with the stock command table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a vocabulary with a custom built-in table
    ///
    /// Phrases are trimmed and lowercased; empty phrases are dropped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if an id is empty or repeated, or an entry has
    /// no usable phrase
    pub fn with_builtins(entries: Vec<CommandEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut builtins = Vec::with_capacity(entries.len());

        for entry in entries {
            let id = entry.id.trim().to_string();
            if id.is_empty() {
                return Err(Error::InvalidInput("command id is empty".to_string()));
            }
            if !seen.insert(id.clone()) {
                return Err(Error::InvalidInput(format!("duplicate command id '{id}'")));
            }

            let phrases: Vec<String> = entry
                .phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect();
            if phrases.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "command '{id}' has no trigger phrases"
                )));
            }

            builtins.push(CommandEntry { id, phrases });
        }

        Ok(Self {
            builtins,
            overrides: Vec::new(),
            version: 0,
        })
    }

    /// Wrap into a shared handle
    #[must_use]
    pub fn into_shared(self) -> SharedVocabulary {
        Arc::new(RwLock::new(self))
    }

    /// Add or replace a user override
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the trigger or payload is blank
    pub fn add_override(&mut self, trigger: &str, payload: &str) -> Result<()> {
        let trigger = trigger.trim();
        let payload = payload.trim();

        if trigger.is_empty() || payload.is_empty() {
            return Err(Error::InvalidInput(
                "both trigger and payload are required".to_string(),
            ));
        }

        if let Some(existing) = self.overrides.iter_mut().find(|o| o.trigger == trigger) {
            existing.payload = payload.to_string();
            tracing::debug!(trigger, payload, "override replaced");
        } else {
            self.overrides.push(UserOverride {
                trigger: trigger.to_string(),
                payload: payload.to_string(),
            });
            tracing::debug!(trigger, payload, "override added");
        }

        self.version += 1;
        Ok(())
    }

    /// Every row in display order: built-ins first, then overrides
    pub fn list_all(&self) -> impl Iterator<Item = VocabularyRow> + '_ {
        let builtins = self.builtins.iter().map(|entry| VocabularyRow {
            trigger: entry.phrases.join(", "),
            payload: entry.id.clone(),
            user_defined: false,
        });
        let overrides = self.overrides.iter().map(|o| VocabularyRow {
            trigger: o.trigger.clone(),
            payload: o.payload.clone(),
            user_defined: true,
        });
        builtins.chain(overrides)
    }

    /// Built-in entries in declaration order
    #[must_use]
    pub fn builtins(&self) -> &[CommandEntry] {
        &self.builtins
    }

    /// User overrides in insertion order
    #[must_use]
    pub fn overrides(&self) -> &[UserOverride] {
        &self.overrides
    }

    /// Bumped on every override mutation
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }
}
