//! Microphone recognizer: endpointed capture followed by HTTP transcription

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::Recognizer;
use crate::config::Config;
use crate::responder::Utterance;
use crate::voice::{
    Capture, EndpointConfig, SAMPLE_RATE, SpeechToText, record_utterance, samples_to_wav,
};
use crate::voice_loop::{EndReason, EventSender, LoopEvent};
use crate::{Error, Result};

/// Pause before reporting a failed session, so a broken device or backend
/// doesn't spin the restart path
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Flags shared with one running session
struct Session {
    active: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

/// Recognizes speech from the default input device
pub struct MicrophoneRecognizer {
    stt: Arc<SpeechToText>,
    endpoint: EndpointConfig,
    events: EventSender,
    session: Option<Session>,
}

impl MicrophoneRecognizer {
    /// Create a recognizer that reports to `events`
    pub fn new(stt: SpeechToText, endpoint: EndpointConfig, events: EventSender) -> Self {
        Self {
            stt: Arc::new(stt),
            endpoint,
            events,
            session: None,
        }
    }

    /// Create a recognizer from loaded configuration
    ///
    /// # Errors
    ///
    /// Returns error if the STT API key is missing
    pub fn from_config(config: &Config, events: EventSender) -> Result<Self> {
        let rc = &config.recognizer;
        let stt = SpeechToText::new(
            rc.provider,
            config.stt_api_key()?,
            rc.model.clone(),
            rc.language.clone(),
        )?;
        Ok(Self::new(stt, rc.endpoint.clone(), events))
    }
}

impl Recognizer for MicrophoneRecognizer {
    fn start(&mut self) -> Result<()> {
        if self.is_active() {
            return Err(Error::Recognizer("recognition already started".to_string()));
        }

        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Recognizer(format!("no async runtime: {e}")))?;

        let session = Session {
            active: Arc::new(AtomicBool::new(true)),
            stop: Arc::new(AtomicBool::new(false)),
        };

        handle.spawn(run_session(
            Arc::clone(&self.stt),
            self.endpoint.clone(),
            self.events.clone(),
            Arc::clone(&session.active),
            Arc::clone(&session.stop),
        ));

        self.session = Some(session);
        tracing::debug!("recognition session started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop.store(true, Ordering::Release);
            session.active.store(false, Ordering::Release);
        }
    }

    fn is_active(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.active.load(Ordering::Acquire))
    }
}

impl Drop for MicrophoneRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One capture session: record, transcribe, report
async fn run_session(
    stt: Arc<SpeechToText>,
    endpoint: EndpointConfig,
    events: EventSender,
    active: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
) {
    let reason = recognize(&stt, endpoint, &events, &stop).await;
    finish_session(reason, &events, &active).await;
}

/// Report the end of a session, backing off first after a failure
///
/// `active` is cleared before the event is sent so the loop's restart sees
/// an idle recognizer.
async fn finish_session(reason: EndReason, events: &EventSender, active: &AtomicBool) {
    if let EndReason::Error(e) = &reason {
        tracing::error!(error = %e, "recognition failed");
        tokio::time::sleep(ERROR_BACKOFF).await;
    }

    active.store(false, Ordering::Release);
    // Receiver gone means the loop shut down
    let _ = events.send(LoopEvent::RecognitionEnd(reason));
}

async fn recognize(
    stt: &SpeechToText,
    endpoint: EndpointConfig,
    events: &EventSender,
    stop: &Arc<AtomicBool>,
) -> EndReason {
    let capture_stop = Arc::clone(stop);
    let captured =
        tokio::task::spawn_blocking(move || record_utterance(&endpoint, &capture_stop)).await;

    let samples = match captured {
        Ok(Ok(Capture::Utterance(samples))) => samples,
        Ok(Ok(Capture::NoSpeech)) => return EndReason::NoSpeech,
        Ok(Ok(Capture::Stopped)) => return EndReason::Stopped,
        Ok(Err(e)) => return EndReason::Error(e.to_string()),
        Err(e) => return EndReason::Error(format!("capture task failed: {e}")),
    };

    let transcript = match samples_to_wav(&samples, SAMPLE_RATE) {
        Ok(wav) => stt.transcribe(&wav).await,
        Err(e) => Err(e),
    };

    match end_reason(transcript, stop.load(Ordering::Acquire)) {
        Ok(utterance) => {
            let _ = events.send(LoopEvent::RecognitionResult(utterance));
            EndReason::Completed
        }
        Err(reason) => reason,
    }
}

/// Map a finished transcription to the utterance to deliver, or to the
/// reason the session ends without one
///
/// A stop raised while transcribing wins over any transcript.
fn end_reason(
    transcript: Result<String>,
    stopped: bool,
) -> std::result::Result<Utterance, EndReason> {
    if stopped {
        return Err(EndReason::Stopped);
    }

    match transcript {
        Ok(text) if text.trim().is_empty() => Err(EndReason::NoSpeech),
        Ok(text) => Ok(Utterance::new(text)),
        Err(e) => Err(EndReason::Error(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice_loop::event_channel;

    #[test]
    fn test_transcript_delivered() {
        let result = end_reason(Ok("hello".to_string()), false);
        assert_eq!(result, Ok(Utterance::new("hello")));
    }

    #[test]
    fn test_empty_transcript_is_no_speech() {
        assert_eq!(end_reason(Ok(String::new()), false), Err(EndReason::NoSpeech));
        assert_eq!(end_reason(Ok("  ".to_string()), false), Err(EndReason::NoSpeech));
    }

    #[test]
    fn test_stop_during_transcription_wins() {
        assert_eq!(end_reason(Ok("hello".to_string()), true), Err(EndReason::Stopped));
        let failed = Err(Error::Stt("timeout".to_string()));
        assert_eq!(end_reason(failed, true), Err(EndReason::Stopped));
    }

    #[test]
    fn test_transcription_error() {
        let result = end_reason(Err(Error::Stt("502".to_string())), false);
        assert!(matches!(result, Err(EndReason::Error(e)) if e.contains("502")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_reported_after_backoff() {
        let (tx, mut rx) = event_channel();
        let active = AtomicBool::new(true);
        let started = tokio::time::Instant::now();

        finish_session(EndReason::Error("no device".to_string()), &tx, &active).await;

        assert!(started.elapsed() >= ERROR_BACKOFF);
        assert!(!active.load(Ordering::Acquire));
        assert_eq!(
            rx.try_recv().unwrap(),
            LoopEvent::RecognitionEnd(EndReason::Error("no device".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_normal_end_reported_immediately() {
        let (tx, mut rx) = event_channel();
        let active = Arc::new(AtomicBool::new(true));
        let started = tokio::time::Instant::now();

        let task = tokio::spawn({
            let active = Arc::clone(&active);
            async move { finish_session(EndReason::NoSpeech, &tx, &active).await }
        });

        let event = rx.recv().await.unwrap();
        // Already idle when the end is observed
        assert!(!active.load(Ordering::Acquire));
        assert_eq!(event, LoopEvent::RecognitionEnd(EndReason::NoSpeech));
        assert_eq!(started.elapsed(), std::time::Duration::ZERO);
        task.await.unwrap();
    }
}
