//! Session state and result rendering.
//!
//! One `Session` value holds the current tone id, the last rewrite result
//! and the in-flight guard. It is owned by the service controller and
//! mutated only through the methods here, never through ambient globals.

use serde::Serialize;

use crate::gateway::{RewriteResult, Tone};
use crate::voices::VoicePreference;

#[derive(Debug)]
pub struct Session {
    tone_id: String,
    result: Option<RewriteResult>,
    in_flight: bool,
}

impl Session {
    pub fn new(default_tone: impl Into<String>) -> Self {
        Self {
            tone_id: default_tone.into(),
            result: None,
            in_flight: false,
        }
    }

    pub fn tone_id(&self) -> &str {
        &self.tone_id
    }

    pub fn result(&self) -> Option<&RewriteResult> {
        self.result.as_ref()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Selects a loaded tone. A tone that carries a language reseeds the
    /// voice preference so playback follows the tone's script.
    pub fn select_tone(&mut self, tone: &Tone, preference: &mut VoicePreference) {
        self.tone_id = tone.id.clone();
        if let Some(language) = &tone.language {
            preference.language = language.clone();
        }
    }

    /// Sets the tone id without checking it against the loaded set. Used
    /// only when the tone inventory could not be loaded at all.
    pub fn select_tone_unchecked(&mut self, tone_id: impl Into<String>) {
        self.tone_id = tone_id.into();
    }

    /// Raises the in-flight guard. Returns `false` when a rewrite is
    /// already pending; the caller must treat that as a no-op and must not
    /// issue a second request. Completion is last-write-wins: whichever
    /// rewrite finishes replaces the result wholesale.
    pub fn begin_rewrite(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn complete_rewrite(&mut self, result: RewriteResult) {
        self.result = Some(result);
        self.in_flight = false;
    }

    pub fn fail_rewrite(&mut self) {
        self.in_flight = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextDirection {
    Ltr,
    Rtl,
}

impl TextDirection {
    /// The backend groups `hi` with `ur`/`pa` for nastaliq-style rendering;
    /// match it exactly.
    pub fn for_language(language: Option<&str>) -> Self {
        match language {
            Some("ur" | "hi" | "pa") => TextDirection::Rtl,
            _ => TextDirection::Ltr,
        }
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Display view of a rewrite result: tone badge, direction and word counts.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedResult {
    pub rewritten: String,
    pub tone_name: String,
    pub direction: TextDirection,
    pub original_words: usize,
    pub rewritten_words: usize,
}

impl RenderedResult {
    pub fn new(result: &RewriteResult, original_text: &str) -> Self {
        Self {
            rewritten: result.rewritten.clone(),
            tone_name: result.tone_name.clone(),
            direction: TextDirection::for_language(result.language.as_deref()),
            // The backend's count wins when it reports one.
            original_words: result
                .word_count_original
                .map(|count| count as usize)
                .unwrap_or_else(|| word_count(original_text)),
            rewritten_words: word_count(&result.rewritten),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(language: Option<&str>) -> RewriteResult {
        RewriteResult {
            rewritten: "دل لگے گا تو مزا آئے گا".to_string(),
            tone_name: "اردو شاعری".to_string(),
            language: language.map(String::from),
            word_count_original: None,
        }
    }

    #[test]
    fn rtl_languages_render_right_to_left() {
        for language in ["ur", "hi", "pa"] {
            assert_eq!(
                TextDirection::for_language(Some(language)),
                TextDirection::Rtl
            );
        }
        assert_eq!(TextDirection::for_language(Some("en")), TextDirection::Ltr);
        assert_eq!(
            TextDirection::for_language(Some("ur-PK")),
            TextDirection::Ltr
        );
        assert_eq!(TextDirection::for_language(None), TextDirection::Ltr);
    }

    #[test]
    fn second_begin_while_in_flight_is_refused() {
        let mut session = Session::new("professional");
        assert!(session.begin_rewrite());
        assert!(!session.begin_rewrite());
        session.complete_rewrite(result(Some("ur")));
        assert!(!session.in_flight());
        assert!(session.begin_rewrite());
    }

    #[test]
    fn failure_clears_the_guard_without_touching_the_result() {
        let mut session = Session::new("professional");
        assert!(session.begin_rewrite());
        session.complete_rewrite(result(Some("ur")));
        assert!(session.begin_rewrite());
        session.fail_rewrite();
        assert!(!session.in_flight());
        assert!(session.result().is_some());
    }

    #[test]
    fn selecting_a_tone_with_a_language_reseeds_the_preference() {
        let mut session = Session::new("professional");
        let mut preference = VoicePreference {
            language: "en".to_string(),
            gender: crate::voices::Gender::Female,
            rate: 1.0,
            pitch: 1.0,
        };
        let tone = Tone {
            id: "urdu_poetry".to_string(),
            name: "اردو شاعری".to_string(),
            emoji: "💕".to_string(),
            description: "Romantic Urdu poetry".to_string(),
            language: Some("ur".to_string()),
        };
        session.select_tone(&tone, &mut preference);
        assert_eq!(session.tone_id(), "urdu_poetry");
        assert_eq!(preference.language, "ur");

        let plain = Tone {
            language: None,
            id: "flat".to_string(),
            ..tone
        };
        session.select_tone(&plain, &mut preference);
        assert_eq!(session.tone_id(), "flat");
        assert_eq!(preference.language, "ur");
    }

    #[test]
    fn rendering_prefers_the_backend_word_count() {
        let mut r = result(Some("ur"));
        r.word_count_original = Some(9);
        let rendered = RenderedResult::new(&r, "only three words");
        assert_eq!(rendered.original_words, 9);
        assert_eq!(rendered.direction, TextDirection::Rtl);
        assert_eq!(rendered.rewritten_words, 6);

        let rendered = RenderedResult::new(&result(None), "only three words");
        assert_eq!(rendered.original_words, 3);
        assert_eq!(rendered.direction, TextDirection::Ltr);
    }
}
