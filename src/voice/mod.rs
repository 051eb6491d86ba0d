//! Voice processing module
//!
//! Handles audio capture, utterance endpointing, playback, and the HTTP
//! STT/TTS backends used by the microphone and speaker providers.

mod capture;
mod endpoint;
mod playback;
mod stt;
mod tts;

pub use capture::{AudioCapture, Capture, SAMPLE_RATE, record_utterance, samples_to_wav};
pub use endpoint::{EndpointConfig, EndpointDetector, EndpointState, mean_energy};
pub use playback::{AudioPlayback, DecodedAudio, PlaybackOutcome, decode_mp3};
pub use stt::{SpeechToText, SttProvider};
pub use tts::{TextToSpeech, TtsProvider};
