//! Top-level controller wiring the gateway, session state and playback.
//!
//! `RewriteService` owns the session and the voice preference behind
//! mutexes so the whole service can sit in an `Arc`; lock order is always
//! session, then preference, then tones, and no guard is held across an
//! await.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config_loader;
use crate::error::{Result, RevoiceError};
use crate::gateway::{RewriteRequest, RewriteResult, Tone, ToneGateway};
use crate::playback::PlaybackController;
use crate::session::{Session, TextDirection};
use crate::voices::{VoiceDescriptor, VoicePreference};

pub struct RewriteService {
    gateway: Arc<dyn ToneGateway>,
    playback: PlaybackController,
    session: Mutex<Session>,
    preference: Mutex<VoicePreference>,
    tones: Mutex<Vec<Tone>>,
}

fn audio_enabled() -> bool {
    config_loader::SETTINGS
        .read()
        .map(|s| s.enable_audio)
        .unwrap_or(true)
}

impl RewriteService {
    pub fn new(
        gateway: Arc<dyn ToneGateway>,
        playback: PlaybackController,
        preference: VoicePreference,
        default_tone: &str,
    ) -> Self {
        Self {
            gateway,
            playback,
            session: Mutex::new(Session::new(default_tone)),
            preference: Mutex::new(preference),
            tones: Mutex::new(Vec::new()),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_preference(&self) -> MutexGuard<'_, VoicePreference> {
        self.preference.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_tones(&self) -> MutexGuard<'_, Vec<Tone>> {
        self.tones.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetches the tone set. Failures are non-fatal: the service stays
    /// usable with zero tones and the current tone id untouched.
    pub async fn load_tones(&self) -> usize {
        let tones = match self.gateway.list_tones().await {
            Ok(tones) => tones,
            Err(e) => {
                warn!("could not load tones: {e}");
                Vec::new()
            }
        };

        // Duplicate ids would make selection ambiguous; first one wins.
        let mut seen = HashSet::new();
        let tones: Vec<Tone> = tones
            .into_iter()
            .filter(|tone| seen.insert(tone.id.clone()))
            .collect();
        let count = tones.len();

        if !tones.is_empty() {
            let mut session = self.lock_session();
            if let Some(current) = tones.iter().find(|t| t.id == session.tone_id()) {
                let current = current.clone();
                let mut preference = self.lock_preference();
                session.select_tone(&current, &mut preference);
            } else {
                let first = tones[0].clone();
                warn!(
                    "tone '{}' is not offered by the backend, falling back to '{}'",
                    session.tone_id(),
                    first.id
                );
                let mut preference = self.lock_preference();
                session.select_tone(&first, &mut preference);
            }
        }

        *self.lock_tones() = tones;
        count
    }

    pub fn tones(&self) -> Vec<Tone> {
        self.lock_tones().clone()
    }

    pub fn select_tone(&self, tone_id: &str) -> Result<()> {
        let tone = self.lock_tones().iter().find(|t| t.id == tone_id).cloned();
        match tone {
            Some(tone) => {
                let mut session = self.lock_session();
                let mut preference = self.lock_preference();
                session.select_tone(&tone, &mut preference);
                Ok(())
            }
            None if self.lock_tones().is_empty() => {
                // No inventory to check against; trust the caller.
                debug!("tone inventory is empty, selecting '{tone_id}' unchecked");
                self.lock_session().select_tone_unchecked(tone_id);
                Ok(())
            }
            None => Err(RevoiceError::Validation(format!("unknown tone '{tone_id}'"))),
        }
    }

    /// Rewrites `text` in the current tone. Returns `Ok(None)` without
    /// touching the network when a rewrite is already in flight.
    pub async fn rewrite(&self, text: &str) -> Result<Option<RewriteResult>> {
        if text.trim().is_empty() {
            return Err(RevoiceError::Validation(
                "please enter some text to rewrite".to_string(),
            ));
        }

        let tone = {
            let mut session = self.lock_session();
            if !session.begin_rewrite() {
                debug!("a rewrite is already in flight, ignoring");
                return Ok(None);
            }
            session.tone_id().to_string()
        };

        let request = RewriteRequest {
            text: text.trim().to_string(),
            tone,
        };
        match self.gateway.rewrite(&request).await {
            Ok(result) => {
                self.lock_session().complete_rewrite(result.clone());
                Ok(Some(result))
            }
            Err(e) => {
                self.lock_session().fail_rewrite();
                Err(e)
            }
        }
    }

    /// Speaks the current rewrite result. A result in a right-to-left
    /// language reseeds the preference language for this utterance so the
    /// resolver looks for a voice in the result's script.
    pub async fn speak_current(&self) -> Result<Option<JoinHandle<()>>> {
        let (text, language) = {
            let session = self.lock_session();
            match session.result() {
                Some(result) => (result.rewritten.clone(), result.language.clone()),
                None => {
                    return Err(RevoiceError::Validation(
                        "there is no rewrite result to speak yet".to_string(),
                    ))
                }
            }
        };

        let mut preference = self.lock_preference().clone();
        if let Some(language) = language {
            if TextDirection::for_language(Some(&language)) == TextDirection::Rtl {
                preference.language = language;
            }
        }
        self.speak_text(&text, &preference).await
    }

    /// Speaks arbitrary text via local synthesis. `Ok(None)` when audio is
    /// disabled in the configuration.
    pub async fn speak_text(
        &self,
        text: &str,
        preference: &VoicePreference,
    ) -> Result<Option<JoinHandle<()>>> {
        if !audio_enabled() {
            info!("audio playback is disabled in the configuration");
            return Ok(None);
        }
        Ok(Some(self.playback.start(text, preference).await?))
    }

    /// Speaks text rendered by the backend instead of the local engine.
    pub async fn speak_remote(
        &self,
        text: &str,
        language: &str,
    ) -> Result<Option<JoinHandle<()>>> {
        if !audio_enabled() {
            info!("audio playback is disabled in the configuration");
            return Ok(None);
        }
        let audio = self.gateway.synthesize_inline(text, language).await?;
        Ok(Some(self.playback.start_audio(audio)?))
    }

    pub fn stop_speaking(&self) {
        self.playback.stop();
    }

    /// Downloads an MP3 rendition of `text` and returns the saved path.
    pub async fn download(&self, text: &str, language: &str) -> Result<PathBuf> {
        self.gateway.synthesize_downloadable(text, language).await
    }

    pub async fn health(&self) -> bool {
        self.gateway.health_check().await
    }

    pub async fn voices(&self) -> Result<Vec<VoiceDescriptor>> {
        self.playback.inventory().await
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn preference(&self) -> VoicePreference {
        self.lock_preference().clone()
    }

    pub fn current_tone(&self) -> String {
        self.lock_session().tone_id().to_string()
    }

    pub fn current_result(&self) -> Option<RewriteResult> {
        self.lock_session().result().cloned()
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock_session().in_flight()
    }
}
