//! HTTP client for the tone-rewriting backend.
//!
//! Routes are fixed by the service: `/api/tones`, `/api/health`,
//! `/api/rewrite`, `/api/generate-voice` and `/api/download-voice`. Every
//! operation normalizes failures into the crate error taxonomy: transport
//! problems become [`RevoiceError::Network`], failures the service reports
//! itself become [`RevoiceError::Backend`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config_loader::{Settings, SETTINGS};
use crate::error::{Result, RevoiceError};

/// A rewriting style offered by the backend. The full set is fetched once
/// at startup and is immutable after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tone {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RewriteRequest {
    pub text: String,
    pub tone: String,
}

/// Result of a successful rewrite. Owned by the session; replaced wholesale
/// on each rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteResult {
    pub rewritten: String,
    pub tone_name: String,
    pub language: Option<String>,
    pub word_count_original: Option<u32>,
}

// The backend also echoes `original` and `tone`; both are ignored here.
#[derive(Debug, Deserialize)]
struct RewriteEnvelope {
    #[serde(default)]
    success: bool,
    rewritten: Option<String>,
    tone_name: Option<String>,
    language: Option<String>,
    word_count_original: Option<u32>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoiceEnvelope {
    #[serde(default)]
    success: bool,
    audio: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthEnvelope {
    status: String,
}

#[derive(Debug, Serialize)]
struct VoiceRequest<'a> {
    text: &'a str,
    language: &'a str,
}

/// Operations the backend offers. The concrete [`GatewayClient`] talks HTTP;
/// tests substitute their own implementations.
#[async_trait]
pub trait ToneGateway: Send + Sync {
    async fn list_tones(&self) -> Result<Vec<Tone>>;

    /// Best-effort probe. `true` only when the service answers
    /// `{"status": "healthy"}`; every failure mode is swallowed into `false`.
    async fn health_check(&self) -> bool;

    async fn rewrite(&self, request: &RewriteRequest) -> Result<RewriteResult>;

    /// Backend-rendered audio for immediate playback, decoded from the
    /// base64 payload of `/api/generate-voice`.
    async fn synthesize_inline(&self, text: &str, language: &str) -> Result<Vec<u8>>;

    /// Fetches an MP3 rendition and saves it to the download directory.
    /// Returns the path of the written file.
    async fn synthesize_downloadable(&self, text: &str, language: &str) -> Result<PathBuf>;
}

pub struct GatewayClient {
    client: Client,
    base_url: String,
    download_dir: PathBuf,
}

impl GatewayClient {
    pub fn new() -> Result<Self> {
        let (base_url, timeout_secs, download_dir) = SETTINGS
            .read()
            .map(|s| {
                (
                    s.backend_url.clone(),
                    s.request_timeout_secs,
                    s.download_dir.clone(),
                )
            })
            .unwrap_or_else(|_| {
                let defaults = Settings::default();
                (
                    defaults.backend_url,
                    defaults.request_timeout_secs,
                    defaults.download_dir,
                )
            });
        Self::with_base_url(base_url, timeout_secs, download_dir)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout_secs: u64,
        download_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            download_dir: download_dir.as_ref().to_path_buf(),
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }
}

#[async_trait]
impl ToneGateway for GatewayClient {
    async fn list_tones(&self) -> Result<Vec<Tone>> {
        let response = self.client.get(self.url("/api/tones")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RevoiceError::Backend(format!(
                "tone listing failed with status {status}"
            )));
        }
        let tones: Vec<Tone> = response.json().await?;
        debug!("loaded {} tones from backend", tones.len());
        Ok(tones)
    }

    async fn health_check(&self) -> bool {
        let response = match self.client.get(self.url("/api/health")).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("backend health check failed: {e}");
                return false;
            }
        };
        match response.json::<HealthEnvelope>().await {
            Ok(health) => health.status == "healthy",
            Err(e) => {
                warn!("backend health response was malformed: {e}");
                false
            }
        }
    }

    async fn rewrite(&self, request: &RewriteRequest) -> Result<RewriteResult> {
        // Checked locally, never sent to the backend.
        if request.text.trim().is_empty() {
            return Err(RevoiceError::Validation(
                "please enter some text to rewrite".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.url("/api/rewrite"))
            .json(request)
            .send()
            .await?;
        let envelope: RewriteEnvelope = response.json().await?;

        if !envelope.success {
            return Err(RevoiceError::Backend(envelope.error.unwrap_or_else(|| {
                "the backend reported a failure".to_string()
            })));
        }
        let rewritten = envelope.rewritten.ok_or_else(|| {
            RevoiceError::Backend("the backend response is missing the rewritten text".to_string())
        })?;

        Ok(RewriteResult {
            rewritten,
            tone_name: envelope.tone_name.unwrap_or_default(),
            language: envelope.language,
            word_count_original: envelope.word_count_original,
        })
    }

    async fn synthesize_inline(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(RevoiceError::Validation(
                "there is no text to synthesize".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.url("/api/generate-voice"))
            .json(&VoiceRequest { text, language })
            .send()
            .await?;
        let envelope: VoiceEnvelope = response.json().await?;

        if !envelope.success {
            return Err(RevoiceError::Backend(envelope.error.unwrap_or_else(|| {
                "the backend could not synthesize audio".to_string()
            })));
        }
        let audio = envelope.audio.ok_or_else(|| {
            RevoiceError::Backend("the backend response is missing the audio payload".to_string())
        })?;
        BASE64
            .decode(audio.as_bytes())
            .map_err(|e| RevoiceError::Backend(format!("malformed audio payload: {e}")))
    }

    async fn synthesize_downloadable(&self, text: &str, language: &str) -> Result<PathBuf> {
        if text.trim().is_empty() {
            return Err(RevoiceError::Validation(
                "there is no text to download".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.url("/api/download-voice"))
            .json(&VoiceRequest { text, language })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("error")?.as_str().map(String::from))
                .unwrap_or_else(|| format!("download failed with status {status}"));
            return Err(RevoiceError::Backend(message));
        }

        let filename = format!(
            "brand_voice_{}_{}.mp3",
            language,
            Utc::now().timestamp_millis()
        );
        let path = self.download_dir.join(filename);
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let mut file = tokio::fs::File::create(&path).await?;

        // The payload is opaque binary data; stream it straight to disk.
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        debug!("saved audio to {}", path.display());
        Ok(path)
    }
}
