//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use voiceloop::config::LoopConfig;
use voiceloop::{
    EchoResponder, Error, EventReceiver, EventSender, LoopEvent, Recognizer, Response, Result,
    Synthesizer, Utterance, VoiceLoop, event_channel,
};

/// Everything the mock providers record
#[derive(Debug, Default)]
pub struct MockState {
    pub recognizer_active: bool,
    pub recognizer_starts: usize,
    pub recognizer_stops: usize,
    pub fail_start: bool,
    pub synth_speaking: bool,
    pub spoken: Vec<String>,
    pub cancels: usize,
    pub fail_speak: bool,
}

pub type SharedState = Arc<Mutex<MockState>>;

/// Recognizer that only records commands
pub struct MockRecognizer {
    state: SharedState,
}

impl Recognizer for MockRecognizer {
    fn start(&mut self) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        if s.fail_start {
            return Err(Error::Recognizer("no microphone".to_string()));
        }
        if s.recognizer_active {
            return Err(Error::Recognizer("already active".to_string()));
        }
        s.recognizer_active = true;
        s.recognizer_starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        let mut s = self.state.lock().unwrap();
        s.recognizer_active = false;
        s.recognizer_stops += 1;
    }

    fn is_active(&self) -> bool {
        self.state.lock().unwrap().recognizer_active
    }
}

/// Synthesizer that records what it was asked to say
pub struct MockSynthesizer {
    state: SharedState,
}

impl Synthesizer for MockSynthesizer {
    fn speak(&mut self, response: &Response) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        if s.fail_speak {
            return Err(Error::Synthesizer("no output device".to_string()));
        }
        s.synth_speaking = true;
        s.spoken.push(response.as_str().to_string());
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        self.state.lock().unwrap().synth_speaking
    }

    fn cancel(&mut self) {
        let mut s = self.state.lock().unwrap();
        s.synth_speaking = false;
        s.cancels += 1;
    }
}

/// A loop wired to mock providers and an echo responder
pub struct Harness {
    pub voice_loop: VoiceLoop<MockRecognizer, MockSynthesizer>,
    pub events: EventReceiver,
    pub sender: EventSender,
    pub state: SharedState,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Create a harness with the default processing delay
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Create a harness with a custom loop configuration
    #[must_use]
    pub fn with_config(config: LoopConfig) -> Self {
        let state = SharedState::default();
        let (tx, events) = event_channel();

        let voice_loop = VoiceLoop::new(
            MockRecognizer {
                state: Arc::clone(&state),
            },
            MockSynthesizer {
                state: Arc::clone(&state),
            },
            Arc::new(EchoResponder::default()),
            config,
            tx.clone(),
        );

        Self {
            voice_loop,
            events,
            sender: tx,
            state,
        }
    }

    /// Lock the recorded provider state
    #[must_use]
    pub fn mocks(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Deliver a transcript as the recognizer would
    pub fn hear(&mut self, text: &str) {
        self.voice_loop
            .dispatch(LoopEvent::RecognitionResult(Utterance::new(text)));
    }

    /// Wait for the next queued event and dispatch it
    ///
    /// Returns `None` if nothing arrives within `within`.
    pub async fn pump(&mut self, within: Duration) -> Option<LoopEvent> {
        let event = tokio::time::timeout(within, self.events.recv())
            .await
            .ok()
            .flatten()?;
        self.voice_loop.dispatch(event.clone());
        Some(event)
    }

    /// Finish the current speech as the synthesizer would
    pub fn finish_speaking(&mut self) {
        self.mocks().synth_speaking = false;
        self.voice_loop.dispatch(LoopEvent::SpeechEnd);
    }
}
