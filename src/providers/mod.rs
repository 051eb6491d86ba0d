//! Capability providers driven by the voice loop
//!
//! A [`Recognizer`] turns speech into [`LoopEvent::RecognitionResult`] and
//! [`LoopEvent::RecognitionEnd`] events; a [`Synthesizer`] speaks responses
//! and reports [`LoopEvent::SpeechEnd`]. Both are commanded synchronously
//! from the loop and report back only through the event queue.
//!
//! [`LoopEvent::RecognitionResult`]: crate::voice_loop::LoopEvent::RecognitionResult
//! [`LoopEvent::RecognitionEnd`]: crate::voice_loop::LoopEvent::RecognitionEnd
//! [`LoopEvent::SpeechEnd`]: crate::voice_loop::LoopEvent::SpeechEnd

mod console;
mod microphone;
mod speaker;

pub use console::ConsoleSynthesizer;
pub use microphone::MicrophoneRecognizer;
pub use speaker::SpeakerSynthesizer;

use crate::Result;
use crate::responder::Response;

/// Speech-to-text capability
pub trait Recognizer {
    /// Begin a capture session
    ///
    /// # Errors
    ///
    /// Returns error if a session is already active or cannot be started
    fn start(&mut self) -> Result<()>;

    /// End the current capture session; no-op if none is active
    fn stop(&mut self);

    /// Whether a capture session is in progress
    fn is_active(&self) -> bool;
}

/// Text-to-speech capability
pub trait Synthesizer {
    /// Begin speaking `response`
    ///
    /// # Errors
    ///
    /// Returns error if output cannot be started
    fn speak(&mut self, response: &Response) -> Result<()>;

    /// Whether output is in progress
    fn is_speaking(&self) -> bool;

    /// Abort in-progress output immediately; no end event follows
    fn cancel(&mut self);
}

impl<T: Recognizer + ?Sized> Recognizer for Box<T> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop();
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }
}

impl<T: Synthesizer + ?Sized> Synthesizer for Box<T> {
    fn speak(&mut self, response: &Response) -> Result<()> {
        (**self).speak(response)
    }

    fn is_speaking(&self) -> bool {
        (**self).is_speaking()
    }

    fn cancel(&mut self) {
        (**self).cancel();
    }
}
