//! Playback state machine.
//!
//! Two states, `Idle` and `Speaking`, cycling forever. Starting while
//! already speaking cancels the previous utterance first, so overlapping
//! audio is impossible. Each started utterance gets a token; the watcher
//! task that consumes the completion channel only flips the state back to
//! `Idle` when its token still matches, so a late completion from a
//! cancelled utterance never clobbers a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, RevoiceError};
use crate::synth::{CompletionHandle, SpeechOutcome, SpeechSynthesizer, Utterance};
use crate::voices::{VoiceDescriptor, VoicePreference, VoiceResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Speaking,
}

struct PlaybackInner {
    state: PlaybackState,
    active: Option<u64>,
}

pub struct PlaybackController {
    synth: Arc<dyn SpeechSynthesizer>,
    resolver: Arc<dyn VoiceResolver>,
    inner: Arc<Mutex<PlaybackInner>>,
    next_token: AtomicU64,
}

impl PlaybackController {
    pub fn new(synth: Arc<dyn SpeechSynthesizer>, resolver: Arc<dyn VoiceResolver>) -> Self {
        Self {
            synth,
            resolver,
            inner: Arc::new(Mutex::new(PlaybackInner {
                state: PlaybackState::Idle,
                active: None,
            })),
            next_token: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(PlaybackState::Idle)
    }

    /// Fresh snapshot of the host voice inventory.
    pub async fn inventory(&self) -> Result<Vec<VoiceDescriptor>> {
        self.synth.list_voices().await
    }

    /// Speaks `text` with a voice resolved against the current host
    /// inventory. Returns the watcher task handle; awaiting it waits for
    /// the utterance to finish (or be cancelled).
    pub async fn start(&self, text: &str, preference: &VoicePreference) -> Result<JoinHandle<()>> {
        if text.trim().is_empty() {
            return Err(RevoiceError::Validation(
                "there is no text to speak".to_string(),
            ));
        }
        self.stop();

        // Queried fresh every time; the host may grow or lose voices
        // between calls.
        let inventory = match self.synth.list_voices().await {
            Ok(inventory) => inventory,
            Err(e) => {
                warn!("voice inventory unavailable: {e}");
                Vec::new()
            }
        };
        let voice = self
            .resolver
            .resolve(&inventory, &preference.language, preference.gender)
            .cloned();
        match &voice {
            Some(v) => debug!("resolved voice '{}' ({})", v.name, v.language),
            None => debug!(
                "no matching voice, using host default for '{}'",
                preference.language
            ),
        }

        let handle = self.synth.speak(Utterance {
            text: text.to_string(),
            voice,
            language: preference.language.clone(),
            rate: preference.rate,
            pitch: preference.pitch,
        })?;
        Ok(self.begin(handle))
    }

    /// Plays prerendered audio under the same single-utterance discipline.
    pub fn start_audio(&self, audio: Vec<u8>) -> Result<JoinHandle<()>> {
        if audio.is_empty() {
            return Err(RevoiceError::Validation(
                "there is no audio to play".to_string(),
            ));
        }
        self.stop();
        let handle = self.synth.play_audio(audio)?;
        Ok(self.begin(handle))
    }

    /// Cancels the outstanding utterance. A no-op when already idle.
    pub fn stop(&self) {
        let was_speaking = match self.inner.lock() {
            Ok(mut inner) => {
                let speaking = inner.state == PlaybackState::Speaking;
                inner.state = PlaybackState::Idle;
                inner.active = None;
                speaking
            }
            Err(_) => false,
        };
        if was_speaking {
            self.synth.cancel();
        }
    }

    fn begin(&self, handle: CompletionHandle) -> JoinHandle<()> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = PlaybackState::Speaking;
            inner.active = Some(token);
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = handle.wait().await;
            if let Ok(mut guard) = inner.lock() {
                if guard.active != Some(token) {
                    // A stale completion from an utterance that was already
                    // cancelled; the state belongs to a newer one now.
                    return;
                }
                guard.state = PlaybackState::Idle;
                guard.active = None;
                match outcome {
                    Some(SpeechOutcome::Completed) => {}
                    Some(SpeechOutcome::Failed(message)) => {
                        // Host audio failures are a notice, not a hard error.
                        warn!("speech playback failed: {message}");
                    }
                    None => warn!("the speech host dropped the utterance"),
                }
            }
        })
    }
}
