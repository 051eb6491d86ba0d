//! TOML configuration file loading
//!
//! Supports `~/.config/voiceloop/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoiceLoopConfigFile {
    /// Loop timing and interrupt behaviour
    #[serde(default, rename = "loop")]
    pub voice_loop: LoopFileConfig,

    /// Speech-to-text configuration
    #[serde(default)]
    pub recognizer: RecognizerFileConfig,

    /// Text-to-speech configuration
    #[serde(default)]
    pub synthesizer: SynthesizerFileConfig,

    /// Response generation
    #[serde(default)]
    pub responder: ResponderFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Loop configuration
#[derive(Debug, Default, Deserialize)]
pub struct LoopFileConfig {
    /// Delay between accepting an utterance and speaking the response
    pub processing_delay_ms: Option<u64>,

    /// Allow a user interrupt to abort a pending response
    pub interrupt_during_processing: Option<bool>,
}

/// Recognizer configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecognizerFileConfig {
    /// STT backend ("whisper" or "deepgram")
    pub provider: Option<String>,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub model: Option<String>,

    /// BCP-47 language code
    pub language: Option<String>,

    /// Hard cap on a single capture session
    pub max_duration_secs: Option<f32>,

    /// Size of one analysis chunk
    pub chunk_ms: Option<u32>,

    /// Trailing silence that ends an utterance
    pub silence_secs: Option<f32>,

    /// Short-term / long-term energy ratio that counts as speech
    pub energy_ratio: Option<f32>,

    /// Chunks used to calibrate background energy
    pub calibration_chunks: Option<usize>,
}

/// Synthesizer configuration
#[derive(Debug, Default, Deserialize)]
pub struct SynthesizerFileConfig {
    /// Play responses aloud (false prints them instead)
    pub enabled: Option<bool>,

    /// TTS backend ("openai" or "elevenlabs")
    pub provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub model: Option<String>,

    /// Voice identifier (`OpenAI` voice name or `ElevenLabs` voice ID)
    pub voice: Option<String>,

    /// Speed multiplier (`OpenAI` only)
    pub speed: Option<f32>,
}

/// Responder configuration
#[derive(Debug, Default, Deserialize)]
pub struct ResponderFileConfig {
    /// Text prepended to the echoed utterance
    pub prefix: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoiceLoopConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoiceLoopConfigFile {
    config_file_path().map_or_else(VoiceLoopConfigFile::default, |p| load_config_file_from(&p))
}

/// Load a TOML config file from an explicit path
///
/// Missing, unreadable, or malformed files yield defaults.
pub fn load_config_file_from(path: &Path) -> VoiceLoopConfigFile {
    if !path.exists() {
        return VoiceLoopConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoiceLoopConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoiceLoopConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voiceloop/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voiceloop").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[loop]
processing_delay_ms = 250

[synthesizer]
provider = "elevenlabs"
voice = "KavW1Pkc0hhhh7ge60Uk"
"#,
        )
        .unwrap();

        let fc = load_config_file_from(&path);
        assert_eq!(fc.voice_loop.processing_delay_ms, Some(250));
        assert_eq!(fc.voice_loop.interrupt_during_processing, None);
        assert_eq!(fc.synthesizer.provider.as_deref(), Some("elevenlabs"));
        assert!(fc.recognizer.model.is_none());
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[loop\nprocessing_delay_ms = ").unwrap();

        let fc = load_config_file_from(&path);
        assert!(fc.voice_loop.processing_delay_ms.is_none());
    }

    #[test]
    fn test_missing_file() {
        let fc = load_config_file_from(Path::new("/nonexistent/voiceloop/config.toml"));
        assert!(fc.api_keys.openai.is_none());
    }
}
