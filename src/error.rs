//! Error types for voiceloop

use thiserror::Error;

/// Result type alias for voiceloop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in voiceloop
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Recognizer refused to start or stop a session
    #[error("recognizer error: {0}")]
    Recognizer(String),

    /// Synthesizer refused to speak
    #[error("synthesizer error: {0}")]
    Synthesizer(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
