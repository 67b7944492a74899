//! Utterance resolution
//!
//! Matching is ordered substring containment over a lowercased utterance:
//! user overrides in insertion order, then built-ins in declaration order.
//! The first hit wins; there is no scoring.

use super::types::{MatchSource, Resolution};
use super::vocabulary::Vocabulary;

/// Normalize a recognized utterance for matching
#[must_use]
pub fn normalize(utterance: &str) -> String {
    utterance.trim().to_lowercase()
}

/// Resolve an utterance to the payload it should send, if any
#[must_use]
pub fn resolve(vocabulary: &Vocabulary, utterance: &str) -> Option<Resolution> {
    let normalized = normalize(utterance);

    for entry in vocabulary.overrides() {
        let trigger = entry.trigger.to_lowercase();
        if normalized.contains(&trigger) {
            return Some(Resolution {
                payload: entry.payload.clone(),
                source: MatchSource::Override {
                    trigger: entry.trigger.clone(),
                },
            });
        }
    }

    for entry in vocabulary.builtins() {
        if let Some(phrase) = entry.phrases.iter().find(|p| normalized.contains(p.as_str())) {
            return Some(Resolution {
                payload: entry.id.clone(),
                source: MatchSource::Builtin {
                    command: entry.id.clone(),
                    phrase: phrase.clone(),
                },
            });
        }
    }

    None
}
