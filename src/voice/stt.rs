//! Speech-to-text (STT) processing

use std::str::FromStr;

use crate::{Error, Result};

/// Response from `OpenAI` Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SttProvider {
    /// `OpenAI` Whisper
    #[default]
    Whisper,
    /// Deepgram
    Deepgram,
}

impl SttProvider {
    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }
}

impl FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    language: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(
        provider: SttProvider,
        api_key: String,
        model: String,
        language: String,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(format!("{provider:?} API key required")));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            language,
            provider,
        })
    }

    /// Configured backend
    #[must_use]
    pub const fn provider(&self) -> SttProvider {
        self.provider
    }

    /// Transcribe audio to text
    ///
    /// # Arguments
    ///
    /// * `audio` - WAV audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let transcript = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await?,
        };
        Ok(transcript.trim().to_string())
    }

    /// Transcribe using `OpenAI` Whisper
    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", whisper_language(&self.language).to_string());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&language={}&punctuate=true",
            self.model, self.language
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await?;
        let transcript = parse_deepgram(result);

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

/// First alternative of the first channel, or empty
fn parse_deepgram(result: DeepgramResponse) -> String {
    result
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|c| c.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .unwrap_or_default()
}

/// Whisper takes ISO-639-1 codes ("en"), not BCP-47 tags ("en-US")
fn whisper_language(language: &str) -> &str {
    language.split(['-', '_']).next().unwrap_or(language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("Whisper".parse::<SttProvider>().unwrap(), SttProvider::Whisper);
        assert_eq!(" deepgram ".parse::<SttProvider>().unwrap(), SttProvider::Deepgram);
        assert!("google".parse::<SttProvider>().is_err());
    }

    #[test]
    fn test_whisper_language() {
        assert_eq!(whisper_language("en-US"), "en");
        assert_eq!(whisper_language("pt_BR"), "pt");
        assert_eq!(whisper_language("de"), "de");
    }

    #[test]
    fn test_parse_deepgram() {
        let json = r#"{"results":{"channels":[{"alternatives":[{"transcript":"hello there"}]}]}}"#;
        let response: DeepgramResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parse_deepgram(response), "hello there");

        let empty = r#"{"results":{"channels":[]}}"#;
        let response: DeepgramResponse = serde_json::from_str(empty).unwrap();
        assert_eq!(parse_deepgram(response), "");
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = SpeechToText::new(
            SttProvider::Whisper,
            String::new(),
            "whisper-1".to_string(),
            "en-US".to_string(),
        );
        assert!(result.is_err());
    }
}
