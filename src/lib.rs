//! voiceloop - hands-free voice interaction loop
//!
//! Listens for speech, transcribes it, derives a response, speaks the
//! response, then listens again. At most one response is in flight at a
//! time; a user interrupt cuts speech short.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  LoopEvent   ┌─────────────┐   speak/cancel   ┌──────────────┐
//! │  Recognizer  │─────────────▶│  VoiceLoop  │─────────────────▶│  Synthesizer │
//! │ mic + STT    │◀─────────────│ state, flag │◀─────────────────│ TTS + speaker│
//! └──────────────┘  start/stop  └──────┬──────┘    SpeechEnd     └──────────────┘
//!                                      │ delay + respond
//!                               ┌──────▼──────┐
//!                               │  Responder  │
//!                               └─────────────┘
//! ```

pub mod config;
pub mod error;
pub mod providers;
pub mod responder;
pub mod voice;
pub mod voice_loop;

pub use config::Config;
pub use error::{Error, Result};
pub use providers::{
    ConsoleSynthesizer, MicrophoneRecognizer, Recognizer, SpeakerSynthesizer, Synthesizer,
};
pub use responder::{EchoResponder, Responder, Response, Utterance};
pub use voice_loop::{
    EndReason, EventReceiver, EventSender, LoopEvent, LoopState, VoiceLoop, event_channel,
};
