//! Local speech host backed by espeak-ng and rodio.
//!
//! The output stream must live on one thread, so a dedicated audio thread
//! owns it and consumes commands from a channel. Synthesis shells out to
//! `espeak-ng --stdout` (WAV on stdout) bounded by a wall-clock timeout.
//!
//! Cancellation uses a generation counter: `cancel` bumps the shared
//! generation and stops the playing sink, and the audio thread drops any
//! command or completion whose generation is stale. A cancelled utterance
//! therefore never reports an outcome.

use std::io::Cursor;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use deunicode::deunicode;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::oneshot;
use tracing::{debug, error};
use wait_timeout::ChildExt;

use super::{CompletionHandle, SpeechOutcome, SpeechSynthesizer, Utterance};
use crate::config_loader::{Settings, SETTINGS};
use crate::error::{Result, RevoiceError};
use crate::voices::VoiceDescriptor;

// espeak defaults to 175 words per minute and a pitch of 50 on a 0-99 scale.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;
const BASE_PITCH: f32 = 50.0;

// Scripts that deunicode would transliterate into Latin, changing the
// pronunciation entirely. Text in these languages passes through unchanged.
const PRESERVED_SCRIPTS: &[&str] = &["ur", "hi", "pa"];

enum AudioCommand {
    Speak {
        utterance: Utterance,
        generation: u64,
        done: oneshot::Sender<SpeechOutcome>,
    },
    Play {
        audio: Vec<u8>,
        generation: u64,
        done: oneshot::Sender<SpeechOutcome>,
    },
}

pub struct EspeakSynthesizer {
    tx: Sender<AudioCommand>,
    generation: Arc<AtomicU64>,
    current_sink: Arc<Mutex<Option<Arc<Sink>>>>,
    binary: String,
}

impl EspeakSynthesizer {
    pub fn new() -> Self {
        let (binary, timeout_secs) = SETTINGS
            .read()
            .map(|s| (s.espeak_binary.clone(), s.synth_timeout_secs))
            .unwrap_or_else(|_| {
                let defaults = Settings::default();
                (defaults.espeak_binary, defaults.synth_timeout_secs)
            });
        Self::with_binary(binary, Duration::from_secs(timeout_secs))
    }

    pub fn with_binary(binary: String, timeout: Duration) -> Self {
        let (tx, rx) = channel::<AudioCommand>();
        let generation = Arc::new(AtomicU64::new(0));
        let current_sink: Arc<Mutex<Option<Arc<Sink>>>> = Arc::new(Mutex::new(None));

        let thread_generation = Arc::clone(&generation);
        let thread_sink = Arc::clone(&current_sink);
        let thread_binary = binary.clone();
        thread::spawn(move || {
            run_audio_loop(rx, thread_sink, thread_generation, thread_binary, timeout);
        });

        Self {
            tx,
            generation,
            current_sink,
            binary,
        }
    }

    fn submit(&self, command: AudioCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| RevoiceError::Playback("the audio thread is not available".to_string()))
    }
}

impl Default for EspeakSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for EspeakSynthesizer {
    async fn list_voices(&self) -> Result<Vec<VoiceDescriptor>> {
        let binary = self.binary.clone();
        let output =
            tokio::task::spawn_blocking(move || Command::new(&binary).arg("--voices").output())
                .await
                .map_err(|e| RevoiceError::Playback(format!("voice listing task failed: {e}")))??;

        if !output.status.success() {
            return Err(RevoiceError::Playback(format!(
                "espeak voice listing failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(parse_voice_listing(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    fn speak(&self, utterance: Utterance) -> Result<CompletionHandle> {
        let (done, handle) = CompletionHandle::channel();
        let generation = self.generation.load(Ordering::SeqCst);
        self.submit(AudioCommand::Speak {
            utterance,
            generation,
            done,
        })?;
        Ok(handle)
    }

    fn play_audio(&self, audio: Vec<u8>) -> Result<CompletionHandle> {
        let (done, handle) = CompletionHandle::channel();
        let generation = self.generation.load(Ordering::SeqCst);
        self.submit(AudioCommand::Play {
            audio,
            generation,
            done,
        })?;
        Ok(handle)
    }

    fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut slot) = self.current_sink.lock() {
            if let Some(sink) = slot.take() {
                sink.stop();
            }
        }
    }
}

fn run_audio_loop(
    rx: Receiver<AudioCommand>,
    current_sink: Arc<Mutex<Option<Arc<Sink>>>>,
    generation: Arc<AtomicU64>,
    binary: String,
    timeout: Duration,
) {
    let (_stream, stream_handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            error!("no audio output device: {e}");
            return;
        }
    };

    while let Ok(command) = rx.recv() {
        match command {
            AudioCommand::Speak {
                utterance,
                generation: gen,
                done,
            } => {
                if gen != generation.load(Ordering::SeqCst) {
                    // Cancelled while queued; dropping `done` signals it.
                    continue;
                }
                debug!("synthesizing: {}", utterance.text);
                match synthesize_wav(&binary, &utterance, timeout) {
                    Ok(wav) => {
                        play_bytes(&stream_handle, wav, &current_sink, &generation, gen, done)
                    }
                    Err(e) => {
                        let _ = done.send(SpeechOutcome::Failed(e.to_string()));
                    }
                }
            }
            AudioCommand::Play {
                audio,
                generation: gen,
                done,
            } => {
                if gen != generation.load(Ordering::SeqCst) {
                    continue;
                }
                play_bytes(&stream_handle, audio, &current_sink, &generation, gen, done);
            }
        }
    }
}

fn play_bytes(
    stream_handle: &OutputStreamHandle,
    bytes: Vec<u8>,
    current_sink: &Arc<Mutex<Option<Arc<Sink>>>>,
    generation: &Arc<AtomicU64>,
    gen: u64,
    done: oneshot::Sender<SpeechOutcome>,
) {
    let sink = match Sink::try_new(stream_handle) {
        Ok(sink) => sink,
        Err(e) => {
            let _ = done.send(SpeechOutcome::Failed(format!("audio sink unavailable: {e}")));
            return;
        }
    };
    let source = match Decoder::new(Cursor::new(bytes)) {
        Ok(source) => source,
        Err(e) => {
            let _ = done.send(SpeechOutcome::Failed(format!("could not decode audio: {e}")));
            return;
        }
    };
    sink.append(source.convert_samples::<f32>());

    let sink = Arc::new(sink);
    if let Ok(mut slot) = current_sink.lock() {
        *slot = Some(Arc::clone(&sink));
    }
    sink.sleep_until_end();
    if let Ok(mut slot) = current_sink.lock() {
        slot.take();
    }

    if gen == generation.load(Ordering::SeqCst) {
        let _ = done.send(SpeechOutcome::Completed);
    }
    // Otherwise the utterance was cancelled mid-play; dropping `done`
    // reports that.
}

fn synthesize_wav(binary: &str, utterance: &Utterance, timeout: Duration) -> Result<Vec<u8>> {
    let mut child = Command::new(binary)
        .args(espeak_args(utterance))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    match child.wait_timeout(timeout)? {
        Some(status) if status.success() => {
            let output = child.wait_with_output()?;
            Ok(output.stdout)
        }
        Some(_) => {
            let output = child.wait_with_output()?;
            Err(RevoiceError::Playback(format!(
                "espeak error: {}",
                String::from_utf8_lossy(&output.stderr)
            )))
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(RevoiceError::Playback(format!(
                "synthesis timed out after {}s",
                timeout.as_secs()
            )))
        }
    }
}

// espeak addresses voices by language tag, not display name, so the
// resolved descriptor contributes its tag; with no match we hand espeak the
// requested language and let it pick its own default.
fn espeak_args(utterance: &Utterance) -> Vec<String> {
    let voice_tag = utterance
        .voice
        .as_ref()
        .map(|v| v.language.as_str())
        .unwrap_or(&utterance.language);
    let words_per_minute = ((BASE_WORDS_PER_MINUTE * utterance.rate) as i64).clamp(80, 450);
    let pitch = ((BASE_PITCH * utterance.pitch) as i64).clamp(0, 99);

    vec![
        "--stdout".to_string(),
        "-v".to_string(),
        voice_tag.to_string(),
        "-s".to_string(),
        words_per_minute.to_string(),
        "-p".to_string(),
        pitch.to_string(),
        normalize_text(&utterance.text, voice_tag),
    ]
}

fn normalize_text(text: &str, voice_tag: &str) -> String {
    let base = voice_tag.split(['-', '_']).next().unwrap_or(voice_tag);
    if PRESERVED_SCRIPTS.contains(&base) {
        text.to_string()
    } else {
        deunicode(text)
    }
}

// `espeak-ng --voices` prints a fixed-column table:
//   Pty Language       Age/Gender VoiceName          File                 Other Languages
//    5  en-GB           --/M      english-gb         gmw/en-GB            (en 2)
// Names never contain spaces; the age/gender and file columns land in
// `raw_tags`.
fn parse_voice_listing(listing: &str) -> Vec<VoiceDescriptor> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            Some(VoiceDescriptor {
                name: fields[3].to_string(),
                language: fields[1].to_string(),
                raw_tags: vec![fields[2].to_string(), fields[4].to_string()],
            })
        })
        .collect()
}
