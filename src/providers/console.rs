//! Console synthesizer for running without sound

use super::Synthesizer;
use crate::Result;
use crate::responder::Response;
use crate::voice_loop::{EventSender, LoopEvent};

/// Prints responses to stdout and finishes immediately
pub struct ConsoleSynthesizer {
    events: EventSender,
}

impl ConsoleSynthesizer {
    /// Create a console synthesizer that reports to `events`
    #[must_use]
    pub const fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl Synthesizer for ConsoleSynthesizer {
    fn speak(&mut self, response: &Response) -> Result<()> {
        println!("{response}");
        // Receiver gone means the loop shut down
        let _ = self.events.send(LoopEvent::SpeechEnd);
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        false
    }

    fn cancel(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice_loop::event_channel;

    #[test]
    fn test_speak_reports_end() {
        let (tx, mut rx) = event_channel();
        let mut synth = ConsoleSynthesizer::new(tx);

        synth.speak(&Response::new("hi")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), LoopEvent::SpeechEnd);
        assert!(!synth.is_speaking());
    }
}
