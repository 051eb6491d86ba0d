//! Speaker synthesizer: HTTP TTS played through the default output device

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::Synthesizer;
use crate::config::Config;
use crate::responder::Response;
use crate::voice::{AudioPlayback, PlaybackOutcome, TextToSpeech, decode_mp3};
use crate::voice_loop::{EventSender, LoopEvent};
use crate::{Error, Result};

/// Flags shared with one in-progress output
struct Output {
    speaking: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

/// Speaks responses aloud
pub struct SpeakerSynthesizer {
    tts: Arc<TextToSpeech>,
    events: EventSender,
    output: Option<Output>,
}

impl SpeakerSynthesizer {
    /// Create a synthesizer that reports to `events`
    pub fn new(tts: TextToSpeech, events: EventSender) -> Self {
        Self {
            tts: Arc::new(tts),
            events,
            output: None,
        }
    }

    /// Create a synthesizer from loaded configuration
    ///
    /// # Errors
    ///
    /// Returns error if the TTS API key is missing
    pub fn from_config(config: &Config, events: EventSender) -> Result<Self> {
        let sc = &config.synthesizer;
        let tts = TextToSpeech::new(
            sc.provider,
            config.tts_api_key()?,
            sc.model.clone(),
            sc.voice.clone(),
            sc.speed,
        )?;
        Ok(Self::new(tts, events))
    }
}

impl Synthesizer for SpeakerSynthesizer {
    fn speak(&mut self, response: &Response) -> Result<()> {
        if self.is_speaking() {
            return Err(Error::Synthesizer("already speaking".to_string()));
        }

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Synthesizer(format!("no async runtime: {e}")))?;

        let output = Output {
            speaking: Arc::new(AtomicBool::new(true)),
            stop: Arc::new(AtomicBool::new(false)),
        };

        handle.spawn(run_output(
            Arc::clone(&self.tts),
            response.as_str().to_string(),
            self.events.clone(),
            Arc::clone(&output.speaking),
            Arc::clone(&output.stop),
        ));

        self.output = Some(output);
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        self.output
            .as_ref()
            .is_some_and(|o| o.speaking.load(Ordering::Acquire))
    }

    fn cancel(&mut self) {
        if let Some(output) = self.output.take() {
            output.stop.store(true, Ordering::Release);
            output.speaking.store(false, Ordering::Release);
            tracing::debug!("speech cancelled");
        }
    }
}

impl Drop for SpeakerSynthesizer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Synthesize and play one response, then report the end unless cancelled
async fn run_output(
    tts: Arc<TextToSpeech>,
    text: String,
    events: EventSender,
    speaking: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
) {
    let outcome = play(&tts, &text, &stop).await;
    finish_output(outcome, &events, &speaking, &stop);
}

/// Clear the speaking flag and report the end unless the output was cancelled
///
/// Failures are reported as a normal end so the loop resumes listening.
fn finish_output(
    outcome: Result<PlaybackOutcome>,
    events: &EventSender,
    speaking: &AtomicBool,
    stop: &AtomicBool,
) {
    match outcome {
        Ok(PlaybackOutcome::Finished) => tracing::debug!("speech finished"),
        Ok(PlaybackOutcome::Stopped) => {}
        Err(e) => tracing::error!(error = %e, "speech output failed"),
    }

    speaking.store(false, Ordering::Release);
    if !stop.load(Ordering::Acquire) {
        // Receiver gone means the loop shut down
        let _ = events.send(LoopEvent::SpeechEnd);
    }
}

async fn play(tts: &TextToSpeech, text: &str, stop: &Arc<AtomicBool>) -> Result<PlaybackOutcome> {
    let mp3 = tts.synthesize(text).await?;

    if stop.load(Ordering::Acquire) {
        return Ok(PlaybackOutcome::Stopped);
    }

    let stop = Arc::clone(stop);
    tokio::task::spawn_blocking(move || {
        let audio = decode_mp3(&mp3)?;
        AudioPlayback::new(audio.sample_rate)?.play_blocking(audio.samples, &stop)
    })
    .await
    .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice_loop::event_channel;

    #[test]
    fn test_finished_output_reports_end() {
        let (tx, mut rx) = event_channel();
        let speaking = AtomicBool::new(true);

        finish_output(Ok(PlaybackOutcome::Finished), &tx, &speaking, &AtomicBool::new(false));

        assert!(!speaking.load(Ordering::Acquire));
        assert_eq!(rx.try_recv().unwrap(), LoopEvent::SpeechEnd);
    }

    #[test]
    fn test_failed_synthesis_reports_end() {
        let (tx, mut rx) = event_channel();
        let speaking = AtomicBool::new(true);
        let failed = Err(Error::Tts("quota exceeded".to_string()));

        finish_output(failed, &tx, &speaking, &AtomicBool::new(false));

        assert!(!speaking.load(Ordering::Acquire));
        assert_eq!(rx.try_recv().unwrap(), LoopEvent::SpeechEnd);
    }

    #[test]
    fn test_cancelled_output_is_silent() {
        let (tx, mut rx) = event_channel();
        let speaking = AtomicBool::new(true);
        let stop = AtomicBool::new(true);

        finish_output(Ok(PlaybackOutcome::Stopped), &tx, &speaking, &stop);
        assert!(rx.try_recv().is_err());

        // Even if the backend fails after the cancel
        finish_output(Err(Error::Audio("device lost".to_string())), &tx, &speaking, &stop);
        assert!(rx.try_recv().is_err());
        assert!(!speaking.load(Ordering::Acquire));
    }
}
