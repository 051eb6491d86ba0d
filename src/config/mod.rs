//! Configuration management for voiceloop
//!
//! Every field resolves as env > toml > default.

pub mod file;

use std::time::Duration;

use crate::voice::{EndpointConfig, SttProvider, TtsProvider};
use crate::{Error, Result};

pub use file::{VoiceLoopConfigFile, config_file_path, load_config_file, load_config_file_from};

/// Default delay standing in for response computation time
pub const DEFAULT_PROCESSING_DELAY_MS: u64 = 2000;

/// Default text prepended to the echoed utterance
pub const DEFAULT_RESPONSE_PREFIX: &str = "You said: ";

/// Default `ElevenLabs` voice
pub const DEFAULT_ELEVENLABS_VOICE: &str = "KavW1Pkc0hhhh7ge60Uk";

/// voiceloop configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Loop timing and interrupt behaviour
    pub voice_loop: LoopConfig,

    /// Speech-to-text configuration
    pub recognizer: RecognizerConfig,

    /// Text-to-speech configuration
    pub synthesizer: SynthesizerConfig,

    /// Response generation
    pub responder: ResponderConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Loop configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Fixed delay between accepting an utterance and speaking
    pub processing_delay: Duration,

    /// Whether a user interrupt may abort a pending response
    pub interrupt_during_processing: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            processing_delay: Duration::from_millis(DEFAULT_PROCESSING_DELAY_MS),
            interrupt_during_processing: false,
        }
    }
}

/// Recognizer configuration
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// STT backend
    pub provider: SttProvider,

    /// STT model
    pub model: String,

    /// BCP-47 language code
    pub language: String,

    /// Endpoint detection parameters
    pub endpoint: EndpointConfig,
}

/// Synthesizer configuration
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// Play responses aloud; false prints them to stdout
    pub enabled: bool,

    /// TTS backend
    pub provider: TtsProvider,

    /// TTS model
    pub model: String,

    /// Voice identifier
    pub voice: String,

    /// Speed multiplier (0.25 to 4.0, `OpenAI` only)
    pub speed: f32,
}

/// Responder configuration
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// Text prepended to the echoed utterance
    pub prefix: String,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_RESPONSE_PREFIX.to_string(),
        }
    }
}

/// API keys for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<String>,

    /// `ElevenLabs` API key
    pub elevenlabs: Option<String>,

    /// `Deepgram` API key
    pub deepgram: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| k.as_ref().map(|_| "***");
        f.debug_struct("ApiKeys")
            .field("openai", &mask(&self.openai))
            .field("elevenlabs", &mask(&self.elevenlabs))
            .field("deepgram", &mask(&self.deepgram))
            .finish()
    }
}

impl Config {
    /// Load configuration from the environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if a provider name is not recognized
    pub fn load() -> Result<Self> {
        Self::load_with_overrides(&[])
    }

    /// Load configuration with explicit overrides taking precedence over env
    ///
    /// Overrides use the same keys as the environment (e.g.
    /// `VOICELOOP_TTS_PROVIDER`), so provider-dependent defaults still follow.
    ///
    /// # Errors
    ///
    /// Returns error if a provider name is not recognized
    pub fn load_with_overrides(overrides: &[(&str, String)]) -> Result<Self> {
        let fc = load_config_file();
        Self::from_sources(fc, |key| {
            overrides
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .or_else(|| std::env::var(key).ok())
        })
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a provider name is not recognized
    pub fn from_sources<F>(fc: VoiceLoopConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_bool = |v: String| v == "1" || v.eq_ignore_ascii_case("true");

        // Loop config (env > toml > default)
        let voice_loop = LoopConfig {
            processing_delay: Duration::from_millis(
                env("VOICELOOP_PROCESSING_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .or(fc.voice_loop.processing_delay_ms)
                    .unwrap_or(DEFAULT_PROCESSING_DELAY_MS),
            ),
            interrupt_during_processing: env("VOICELOOP_INTERRUPT_DURING_PROCESSING")
                .map(parse_bool)
                .or(fc.voice_loop.interrupt_during_processing)
                .unwrap_or(false),
        };

        // Recognizer config
        let rc = fc.recognizer;
        let stt_provider = env("VOICELOOP_STT_PROVIDER")
            .or(rc.provider)
            .map(|s| s.parse::<SttProvider>())
            .transpose()?
            .unwrap_or_default();
        let endpoint = {
            let default = EndpointConfig::default();
            EndpointConfig {
                chunk_ms: rc.chunk_ms.unwrap_or(default.chunk_ms),
                silence_secs: rc.silence_secs.unwrap_or(default.silence_secs),
                max_duration_secs: rc.max_duration_secs.unwrap_or(default.max_duration_secs),
                energy_ratio: rc.energy_ratio.unwrap_or(default.energy_ratio),
                calibration_chunks: rc.calibration_chunks.unwrap_or(default.calibration_chunks),
            }
        };
        endpoint.validate()?;
        let recognizer = RecognizerConfig {
            provider: stt_provider,
            model: env("VOICELOOP_STT_MODEL")
                .or(rc.model)
                .unwrap_or_else(|| stt_provider.default_model().to_string()),
            language: env("VOICELOOP_LANGUAGE")
                .or(rc.language)
                .unwrap_or_else(|| "en-US".to_string()),
            endpoint,
        };

        // Synthesizer config
        let sc = fc.synthesizer;
        let tts_provider = env("VOICELOOP_TTS_PROVIDER")
            .or(sc.provider)
            .map(|s| s.parse::<TtsProvider>())
            .transpose()?
            .unwrap_or_default();
        let speed = sc.speed.unwrap_or(1.0);
        if !(0.25..=4.0).contains(&speed) {
            return Err(Error::Config(format!(
                "synthesizer speed {speed} outside 0.25..=4.0"
            )));
        }
        let synthesizer = SynthesizerConfig {
            enabled: env("VOICELOOP_SOUND")
                .map(parse_bool)
                .or(sc.enabled)
                .unwrap_or(true),
            provider: tts_provider,
            model: env("VOICELOOP_TTS_MODEL")
                .or(sc.model)
                .unwrap_or_else(|| tts_provider.default_model().to_string()),
            voice: env("VOICELOOP_TTS_VOICE")
                .or(sc.voice)
                .unwrap_or_else(|| tts_provider.default_voice().to_string()),
            speed,
        };

        let responder = ResponderConfig {
            prefix: env("VOICELOOP_RESPONSE_PREFIX")
                .or(fc.responder.prefix)
                .unwrap_or_else(|| DEFAULT_RESPONSE_PREFIX.to_string()),
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            elevenlabs: env("ELEVENLABS_API_KEY")
                .or_else(|| env("ELEVEN_LABS_API_KEY"))
                .or(fc.api_keys.elevenlabs),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
        };

        Ok(Self {
            voice_loop,
            recognizer,
            synthesizer,
            responder,
            api_keys,
        })
    }

    /// API key required by the configured STT backend
    ///
    /// # Errors
    ///
    /// Returns error if the key is not configured
    pub fn stt_api_key(&self) -> Result<String> {
        let (key, name) = match self.recognizer.provider {
            SttProvider::Whisper => (&self.api_keys.openai, "OPENAI_API_KEY"),
            SttProvider::Deepgram => (&self.api_keys.deepgram, "DEEPGRAM_API_KEY"),
        };
        key.clone()
            .ok_or_else(|| Error::Config(format!("{name} required for speech recognition")))
    }

    /// API key required by the configured TTS backend
    ///
    /// # Errors
    ///
    /// Returns error if the key is not configured
    pub fn tts_api_key(&self) -> Result<String> {
        let (key, name) = match self.synthesizer.provider {
            TtsProvider::OpenAI => (&self.api_keys.openai, "OPENAI_API_KEY"),
            TtsProvider::ElevenLabs => (&self.api_keys.elevenlabs, "ELEVENLABS_API_KEY"),
        };
        key.clone()
            .ok_or_else(|| Error::Config(format!("{name} required for speech synthesis")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(VoiceLoopConfigFile::default(), env_from(&[])).unwrap();

        assert_eq!(config.voice_loop, LoopConfig::default());
        assert_eq!(config.recognizer.provider, SttProvider::Whisper);
        assert_eq!(config.recognizer.model, "whisper-1");
        assert_eq!(config.recognizer.language, "en-US");
        assert_eq!(config.synthesizer.provider, TtsProvider::OpenAI);
        assert_eq!(config.synthesizer.voice, "alloy");
        assert!(config.synthesizer.enabled);
        assert_eq!(config.responder.prefix, DEFAULT_RESPONSE_PREFIX);
        assert!(config.stt_api_key().is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc: VoiceLoopConfigFile = toml::from_str(
            r#"
[loop]
processing_delay_ms = 300

[synthesizer]
provider = "openai"

[api_keys]
openai = "from-file"
"#,
        )
        .unwrap();

        let config = Config::from_sources(
            fc,
            env_from(&[
                ("VOICELOOP_PROCESSING_DELAY_MS", "50"),
                ("VOICELOOP_TTS_PROVIDER", "elevenlabs"),
                ("ELEVEN_LABS_API_KEY", "legacy-name"),
            ]),
        )
        .unwrap();

        assert_eq!(config.voice_loop.processing_delay, Duration::from_millis(50));
        assert_eq!(config.synthesizer.provider, TtsProvider::ElevenLabs);
        assert_eq!(config.synthesizer.voice, DEFAULT_ELEVENLABS_VOICE);
        assert_eq!(config.api_keys.openai.as_deref(), Some("from-file"));
        assert_eq!(config.tts_api_key().unwrap(), "legacy-name");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result = Config::from_sources(
            VoiceLoopConfigFile::default(),
            env_from(&[("VOICELOOP_STT_PROVIDER", "google")]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_api_keys_masked_in_debug() {
        let keys = ApiKeys {
            openai: Some("sk-secret".to_string()),
            ..ApiKeys::default()
        };
        let printed = format!("{keys:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("***"));
    }
}
