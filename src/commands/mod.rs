//! Voice command vocabulary and resolution
//!
//! Maps recognized speech to the payload sent to the peripheral

pub mod resolver;
pub mod types;
pub mod vocabulary;

pub use resolver::{normalize, resolve};
pub use types::{
    CommandEntry, MatchSource, Resolution, UserOverride, VocabularyRow, default_commands,
};
pub use vocabulary::{SharedVocabulary, Vocabulary};
