//! Speech host abstraction.
//!
//! A [`SpeechSynthesizer`] exposes the host's voice inventory and turns
//! utterances into audible output. Submitting an utterance returns a
//! [`CompletionHandle`], a single-shot channel that resolves when the host
//! finishes or fails; a cancelled utterance drops its sender, so the handle
//! resolves to `None` instead of an outcome.

pub mod espeak;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::voices::VoiceDescriptor;

/// A single speech request: text plus the resolved voice and delivery
/// parameters. `language` is the fallback voice tag when no concrete voice
/// was resolved.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<VoiceDescriptor>,
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
}

/// How the host finished an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    Completed,
    Failed(String),
}

/// Receiving half of an utterance's completion channel.
pub struct CompletionHandle {
    rx: oneshot::Receiver<SpeechOutcome>,
}

impl CompletionHandle {
    pub fn channel() -> (oneshot::Sender<SpeechOutcome>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Resolves once the host finishes the utterance. `None` means the
    /// utterance was cancelled before it produced an outcome.
    pub async fn wait(self) -> Option<SpeechOutcome> {
        self.rx.await.ok()
    }
}

/// Host capability surface: queryable voice inventory, speak/cancel, and
/// playback of prerendered audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Fresh snapshot of the host voice inventory. The inventory may change
    /// between calls, so callers query it at selection time instead of
    /// caching it.
    async fn list_voices(&self) -> Result<Vec<VoiceDescriptor>>;

    /// Submits an utterance for synthesis and playback. At most one
    /// utterance is audible at a time; the caller cancels any previous one
    /// first.
    fn speak(&self, utterance: Utterance) -> Result<CompletionHandle>;

    /// Plays prerendered audio (an MP3 from the backend) under the same
    /// single-outstanding discipline as [`speak`](Self::speak).
    fn play_audio(&self, audio: Vec<u8>) -> Result<CompletionHandle>;

    /// Cancels the outstanding utterance, if any.
    fn cancel(&self);
}
