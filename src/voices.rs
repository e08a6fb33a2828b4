//! Voice preference types and voice selection.
//!
//! Host voice naming is free text and inconsistent across platforms, so
//! selection is heuristic by design: a wrong-but-plausible voice is
//! acceptable degraded behavior. What must hold exactly is the tiering
//! order: language-and-gender match > language-only match > no match.

use serde::{Deserialize, Serialize};

/// Requested speaker gender for synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(format!("unknown gender '{}' (use male or female)", other)),
        }
    }
}

/// Mutable user setting for speech playback, independent of any rewrite
/// result. Selecting a tone that carries a language reseeds `language`.
#[derive(Debug, Clone)]
pub struct VoicePreference {
    pub language: String,
    pub gender: Gender,
    pub rate: f32,
    pub pitch: f32,
}

/// Host-provided metadata for one selectable synthetic voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    pub name: String,
    pub language: String,
    pub raw_tags: Vec<String>,
}

/// Picks a concrete voice out of the host inventory, or `None` when nothing
/// matches the requested language (the caller then uses the host default
/// for the requested language tag).
pub trait VoiceResolver: Send + Sync {
    fn resolve<'a>(
        &self,
        inventory: &'a [VoiceDescriptor],
        language: &str,
        gender: Gender,
    ) -> Option<&'a VoiceDescriptor>;
}

// Tokens are matched case-sensitively: "Female" must never satisfy the
// male list via its "male" suffix.
const FEMALE_TOKENS: &[&str] = &["Female", "Samantha", "Zira", "Google UK"];
const MALE_TOKENS: &[&str] = &["Male", "Daniel"];

/// Default selection strategy: substring language match, then prefer voices
/// whose display name carries a gender-indicative token, then the first
/// language match regardless of gender.
pub struct NameHeuristicResolver;

impl VoiceResolver for NameHeuristicResolver {
    fn resolve<'a>(
        &self,
        inventory: &'a [VoiceDescriptor],
        language: &str,
        gender: Gender,
    ) -> Option<&'a VoiceDescriptor> {
        let tokens = match gender {
            Gender::Female => FEMALE_TOKENS,
            Gender::Male => MALE_TOKENS,
        };

        // Substring, not equality: hosts report "en", "en-US", "en_GB"...
        let mut language_matches = inventory
            .iter()
            .filter(|v| v.language.contains(language))
            .peekable();

        let first_language_match = language_matches.peek().copied();

        language_matches
            .find(|v| tokens.iter().any(|t| v.name.contains(t)))
            .or(first_language_match)
    }
}
