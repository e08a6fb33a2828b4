//! revoice - terminal client for the Brand Voice tone-rewriting service.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use revoice::config_loader::{Settings, SETTINGS};
use revoice::gateway::GatewayClient;
use revoice::playback::PlaybackController;
use revoice::service::RewriteService;
use revoice::session::{RenderedResult, TextDirection};
use revoice::synth::espeak::EspeakSynthesizer;
use revoice::voices::{Gender, NameHeuristicResolver, VoicePreference};
use revoice::RevoiceError;

/// Rewrite text in a chosen tone, with speech playback and MP3 download
#[derive(Parser)]
#[command(name = "revoice")]
#[command(version)]
#[command(about = "Client for the Brand Voice tone-rewriting service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tones offered by the backend
    Tones,

    /// Check backend health
    Health,

    /// Rewrite text in the selected tone
    Rewrite {
        /// Text to rewrite
        text: String,
        /// Tone id (defaults to the configured tone)
        #[arg(short, long)]
        tone: Option<String>,
    },

    /// Speak text aloud
    Speak {
        /// Text to speak
        text: String,
        /// Voice language tag (e.g. en, ur)
        #[arg(short, long)]
        language: Option<String>,
        /// Preferred speaker gender: male or female
        #[arg(short, long)]
        gender: Option<String>,
        /// Speech rate multiplier (1.0 is normal)
        #[arg(long)]
        rate: Option<f32>,
        /// Speech pitch multiplier (1.0 is normal)
        #[arg(long)]
        pitch: Option<f32>,
        /// Use backend-rendered audio instead of local synthesis
        #[arg(long)]
        remote: bool,
    },

    /// List the voices available to the local synthesizer
    Voices {
        /// Only show voices matching this language tag
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Download an MP3 rendition of the text
    Download {
        /// Text to render
        text: String,
        /// Voice language tag (defaults to the configured voice language)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Rewrite a sample sentence end to end, then speak the result
    Demo,
}

fn base_preference() -> VoicePreference {
    let settings = SETTINGS
        .read()
        .map(|s| VoicePreference {
            language: s.voice_language.clone(),
            gender: s.voice_gender.parse().unwrap_or_else(|e| {
                warn!("{e}, defaulting to female");
                Gender::Female
            }),
            rate: s.voice_rate,
            pitch: s.voice_pitch,
        })
        .ok();
    settings.unwrap_or(VoicePreference {
        language: Settings::default().voice_language,
        gender: Gender::Female,
        rate: 1.0,
        pitch: 1.0,
    })
}

fn print_rendered(rendered: &RenderedResult) {
    println!();
    println!("{}", rendered.tone_name);
    println!("────────────────");
    println!("{}", rendered.rewritten);
    println!();
    let direction = match rendered.direction {
        TextDirection::Rtl => "right-to-left",
        TextDirection::Ltr => "left-to-right",
    };
    println!(
        "{} words in, {} words out ({})",
        rendered.original_words, rendered.rewritten_words, direction
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let default_tone = SETTINGS
        .read()
        .map(|s| s.default_tone.clone())
        .unwrap_or_else(|_| Settings::default().default_tone);
    let preference = base_preference();

    let gateway = Arc::new(GatewayClient::new()?);
    let playback = PlaybackController::new(
        Arc::new(EspeakSynthesizer::new()),
        Arc::new(NameHeuristicResolver),
    );
    let service = RewriteService::new(gateway, playback, preference.clone(), &default_tone);

    match cli.command {
        Commands::Tones => {
            let count = service.load_tones().await;
            if count == 0 {
                println!("No tones available (is the backend running?)");
            } else {
                println!("Available Tones");
                println!("───────────────");
                for tone in service.tones() {
                    println!("  {} ({})", tone.name, tone.id);
                    println!("      {}", tone.description);
                }
                println!();
                println!("{count} tones");
            }
        }

        Commands::Health => {
            if service.health().await {
                println!("backend is healthy");
            } else {
                println!("backend is unreachable or unhealthy");
            }
        }

        Commands::Rewrite { text, tone } => {
            service.load_tones().await;
            if let Some(tone_id) = tone {
                service.select_tone(&tone_id)?;
            }
            match service.rewrite(&text).await? {
                Some(result) => print_rendered(&RenderedResult::new(&result, &text)),
                None => println!("a rewrite is already in progress"),
            }
        }

        Commands::Speak {
            text,
            language,
            gender,
            rate,
            pitch,
            remote,
        } => {
            let mut preference = preference;
            if let Some(language) = language {
                preference.language = language;
            }
            if let Some(gender) = gender {
                preference.gender = gender.parse().map_err(RevoiceError::Validation)?;
            }
            if let Some(rate) = rate {
                preference.rate = rate;
            }
            if let Some(pitch) = pitch {
                preference.pitch = pitch;
            }
            if preference.rate <= 0.0 || preference.pitch <= 0.0 {
                return Err(RevoiceError::Validation(
                    "rate and pitch must be greater than 0".to_string(),
                )
                .into());
            }

            let handle = if remote {
                service.speak_remote(&text, &preference.language).await?
            } else {
                service.speak_text(&text, &preference).await?
            };
            match handle {
                Some(handle) => {
                    println!("Speaking: {text}");
                    let _ = handle.await;
                }
                None => println!("audio playback is disabled (enable_audio = false)"),
            }
        }

        Commands::Voices { language } => {
            let voices = service.voices().await?;
            let voices: Vec<_> = match &language {
                Some(tag) => voices
                    .into_iter()
                    .filter(|v| v.language.contains(tag.as_str()))
                    .collect(),
                None => voices,
            };
            if voices.is_empty() {
                println!("No voices found");
            } else {
                println!("Available Voices");
                println!("────────────────");
                for voice in voices {
                    println!("  {} ({})", voice.name, voice.language);
                }
            }
        }

        Commands::Download { text, language } => {
            let language = language.unwrap_or_else(|| preference.language.clone());
            let path = service.download(&text, &language).await?;
            println!("Saved {}", path.display());
        }

        Commands::Demo => {
            let count = service.load_tones().await;
            println!("Loaded {count} tones");

            let text = "We need to schedule a meeting to discuss the Q4 results.";
            println!("Input: {text}");
            match service.rewrite(text).await? {
                Some(result) => {
                    print_rendered(&RenderedResult::new(&result, text));
                    if let Some(handle) = service.speak_current().await? {
                        println!();
                        println!("Speaking the result...");
                        let _ = handle.await;
                    }
                }
                None => println!("a rewrite is already in progress"),
            }
        }
    }

    Ok(())
}
