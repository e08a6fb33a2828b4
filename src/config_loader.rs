use config::{Config, File};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::sync::RwLock;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub backend_url: String,
    pub request_timeout_secs: u64,
    pub download_dir: String,
    pub enable_audio: bool,
    pub default_tone: String,
    // Voice preference defaults (overridable per invocation)
    pub voice_language: String,
    pub voice_gender: String, // "male" or "female"
    pub voice_rate: f32,
    pub voice_pitch: f32,
    // Local synthesis settings
    pub espeak_binary: String,
    pub synth_timeout_secs: u64,
}

fn default_download_dir() -> String {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| "/tmp".into())
        .to_string_lossy()
        .into_owned()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 30,
            download_dir: default_download_dir(),
            enable_audio: true,
            default_tone: "professional".to_string(),
            voice_language: "en".to_string(),
            voice_gender: "female".to_string(),
            voice_rate: 1.0,
            voice_pitch: 1.0,
            espeak_binary: "espeak-ng".to_string(),
            synth_timeout_secs: 5,
        }
    }
}

lazy_static! {
    pub static ref SETTINGS: RwLock<Settings> =
        RwLock::new(Settings::new().unwrap_or_default());
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = Config::builder()
            // Connect to defaults
            .set_default("backend_url", "http://localhost:5000")?
            .set_default("request_timeout_secs", 30)?
            .set_default("download_dir", default_download_dir())?
            .set_default("enable_audio", true)?
            .set_default("default_tone", "professional")?
            .set_default("voice_language", "en")?
            .set_default("voice_gender", "female")?
            .set_default("voice_rate", 1.0)?
            .set_default("voice_pitch", 1.0)?
            .set_default("espeak_binary", "espeak-ng")?
            .set_default("synth_timeout_secs", 5)?
            // Merge with local config file (if exists)
            .add_source(File::with_name("Revoice").required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.config/revoice/Revoice",
                    std::env::var("HOME").unwrap_or_default()
                ))
                .required(false),
            )
            // Merge with environment variables (e.g. REVOICE_BACKEND_URL)
            .add_source(config::Environment::with_prefix("REVOICE"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.backend_url.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "backend_url must not be empty".to_string(),
            ));
        }
        if self.voice_rate <= 0.0 {
            return Err(config::ConfigError::Message(format!(
                "Invalid voice_rate: {}. Must be greater than 0",
                self.voice_rate
            )));
        }
        if self.voice_pitch <= 0.0 {
            return Err(config::ConfigError::Message(format!(
                "Invalid voice_pitch: {}. Must be greater than 0",
                self.voice_pitch
            )));
        }
        if self.synth_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "synth_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_load() {
        let settings = Settings::new().expect("Failed to load settings");
        assert!(settings.voice_rate > 0.0);
        assert!(!settings.backend_url.is_empty());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("REVOICE_DEFAULT_TONE", "sassy");
        let settings = Settings::new().expect("Failed to load settings");
        assert_eq!(settings.default_tone, "sassy");
        std::env::remove_var("REVOICE_DEFAULT_TONE");
    }

    #[test]
    fn test_validate_rejects_bad_rate() {
        let settings = Settings {
            voice_rate: 0.0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
