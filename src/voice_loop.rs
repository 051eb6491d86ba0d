//! Voice loop - the listen / process / speak cycle
//!
//! A single task owns all loop state and drains one event queue. Providers
//! and the processing timer only post [`LoopEvent`]s; every state change
//! happens inside [`VoiceLoop::dispatch`], so reads and writes of the
//! processing flag never interleave.
//!
//! ```text
//!   Idle ──start──▶ Listening ──result──▶ Processing ──delay──▶ Speaking
//!                     ▲   │                                       │
//!                     │   └──end (not processing)──┐              │
//!                     └────────────────────────────┴─speech end───┤
//!                     └────────────────────────────── interrupt ──┘
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Result;
use crate::config::LoopConfig;
use crate::providers::{Recognizer, Synthesizer};
use crate::responder::{Responder, Response, Utterance};

/// Wait before retrying a recognizer that refused to start
pub const START_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Sending half of the loop's event queue
pub type EventSender = mpsc::UnboundedSender<LoopEvent>;

/// Receiving half of the loop's event queue
pub type EventReceiver = mpsc::UnboundedReceiver<LoopEvent>;

/// Create the event queue shared by the loop and its providers
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Why a recognition session ended
///
/// Every reason takes the same restart path; the distinction is only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// A transcript was delivered
    Completed,
    /// The session was stopped by the loop
    Stopped,
    /// Nothing intelligible was heard before the session timed out
    NoSpeech,
    /// Capture or transcription failed
    Error(String),
}

/// Events consumed by the voice loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// The recognizer produced a transcript
    RecognitionResult(Utterance),
    /// A recognition session ended
    RecognitionEnd(EndReason),
    /// The synthesizer finished speaking
    SpeechEnd,
    /// External interrupt (e.g. the user pressed a key)
    UserInterrupt,
    /// The processing delay elapsed and a response is ready
    ResponseReady {
        /// Identifies the processing task that produced the response
        ticket: u64,
        /// Text to speak
        response: Response,
    },
}

/// Loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    /// Not started, or shut down
    #[default]
    Idle,
    /// Recognizer is capturing
    Listening,
    /// A response is being computed
    Processing,
    /// A response is being spoken
    Speaking,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Listening => write!(f, "listening"),
            Self::Processing => write!(f, "processing"),
            Self::Speaking => write!(f, "speaking"),
        }
    }
}

/// Scheduled processing task awaiting its delay
struct PendingResponse {
    ticket: u64,
    task: JoinHandle<()>,
}

/// Cycles between listening, processing, and speaking with at most one
/// response in flight
pub struct VoiceLoop<R, S> {
    recognizer: R,
    synthesizer: S,
    responder: Arc<dyn Responder>,
    config: LoopConfig,
    events: EventSender,
    state: LoopState,
    processing: bool,
    next_ticket: u64,
    pending: Option<PendingResponse>,
    retry: Option<JoinHandle<()>>,
}

impl<R: Recognizer, S: Synthesizer> VoiceLoop<R, S> {
    /// Create a loop in the `Idle` state
    ///
    /// `events` must feed the receiver later passed to [`Self::run`] (or
    /// drained by the caller into [`Self::dispatch`]).
    pub fn new(
        recognizer: R,
        synthesizer: S,
        responder: Arc<dyn Responder>,
        config: LoopConfig,
        events: EventSender,
    ) -> Self {
        Self {
            recognizer,
            synthesizer,
            responder,
            config,
            events,
            state: LoopState::Idle,
            processing: false,
            next_ticket: 0,
            pending: None,
            retry: None,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Whether a response is being computed or spoken
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        self.processing
    }

    /// The recognizer
    #[must_use]
    pub const fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// The synthesizer
    #[must_use]
    pub const fn synthesizer(&self) -> &S {
        &self.synthesizer
    }

    /// Leave `Idle` and begin listening
    pub fn start(&mut self) {
        tracing::info!(
            delay_ms = u64::try_from(self.config.processing_delay.as_millis()).unwrap_or(u64::MAX),
            "voice loop starting"
        );
        self.start_listening();
    }

    /// Run until `shutdown` fires, dispatching queued events
    ///
    /// # Errors
    ///
    /// Currently infallible; reserved for provider setup failures
    pub async fn run(
        mut self,
        mut events: EventReceiver,
        shutdown: &mut mpsc::Receiver<()>,
    ) -> Result<()> {
        self.start();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.dispatch(event);
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Apply one event
    pub fn dispatch(&mut self, event: LoopEvent) {
        tracing::trace!(state = %self.state, ?event, "dispatch");

        match event {
            LoopEvent::RecognitionResult(utterance) => self.on_recognition_result(utterance),
            LoopEvent::RecognitionEnd(reason) => self.on_recognition_end(&reason),
            LoopEvent::SpeechEnd => self.on_speech_end(),
            LoopEvent::UserInterrupt => self.on_user_interrupt(),
            LoopEvent::ResponseReady { ticket, response } => {
                self.on_response_ready(ticket, &response);
            }
        }
    }

    /// Begin capturing unless a response is in flight or capture is running
    pub fn start_listening(&mut self) {
        if self.processing {
            tracing::trace!("response in flight, not listening");
            return;
        }

        if self.recognizer.is_active() {
            tracing::trace!("recognizer already active");
            self.state = LoopState::Listening;
            return;
        }

        match self.recognizer.start() {
            Ok(()) => {
                self.state = LoopState::Listening;
                tracing::debug!("listening");
            }
            Err(e) => {
                self.state = LoopState::Idle;
                tracing::warn!(error = %e, "recognizer failed to start");
                self.schedule_start_retry(e.to_string());
            }
        }
    }

    /// Post a recognition end after [`START_RETRY_DELAY`] so a failed start
    /// is retried even when no session exists to report one
    fn schedule_start_retry(&mut self, error: String) {
        if self.retry.as_ref().is_some_and(|r| !r.is_finished()) {
            return;
        }

        let events = self.events.clone();
        self.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(START_RETRY_DELAY).await;
            // Receiver gone means the loop shut down
            let _ = events.send(LoopEvent::RecognitionEnd(EndReason::Error(error)));
        }));
    }

    /// Stop capturing; no-op if not capturing
    pub fn stop_listening(&mut self) {
        if self.recognizer.is_active() {
            self.recognizer.stop();
            tracing::debug!("stopped listening");
        }
    }

    /// A transcript arrived: stop capture, then process it
    pub fn on_recognition_result(&mut self, utterance: Utterance) {
        tracing::info!(utterance = %utterance, "heard");
        self.stop_listening();
        self.process_input(utterance);
    }

    /// Accept an utterance and schedule its response
    ///
    /// Dropped if a response is already in flight.
    pub fn process_input(&mut self, utterance: Utterance) {
        if self.processing {
            tracing::warn!(
                utterance = %utterance,
                "response already in flight, dropping utterance"
            );
            return;
        }

        self.processing = true;
        self.state = LoopState::Processing;

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let delay = self.config.processing_delay;
        let responder = Arc::clone(&self.responder);
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let response = responder.respond(&utterance).await;
            // Receiver gone means the loop shut down
            let _ = events.send(LoopEvent::ResponseReady { ticket, response });
        });

        self.pending = Some(PendingResponse { ticket, task });
        tracing::debug!(ticket, "processing");
    }

    fn on_response_ready(&mut self, ticket: u64, response: &Response) {
        if self.pending.as_ref().is_none_or(|p| p.ticket != ticket) {
            tracing::debug!(ticket, "stale response discarded");
            return;
        }
        self.pending = None;

        self.state = LoopState::Speaking;
        tracing::info!(response = %response, "speaking");

        if let Err(e) = self.synthesizer.speak(response) {
            tracing::warn!(error = %e, "synthesizer failed to speak");
            self.processing = false;
            self.start_listening();
        }
    }

    /// Speech finished: clear the flag and listen again
    pub fn on_speech_end(&mut self) {
        if self.state == LoopState::Processing {
            tracing::debug!("speech end while processing ignored");
            return;
        }

        self.processing = false;
        self.start_listening();
    }

    /// A recognition session ended; restart unless a response is in flight
    pub fn on_recognition_end(&mut self, reason: &EndReason) {
        match reason {
            EndReason::Error(e) => tracing::warn!(error = %e, "recognition session failed"),
            EndReason::NoSpeech => tracing::debug!("no speech detected"),
            EndReason::Completed | EndReason::Stopped => {
                tracing::trace!(?reason, "recognition session ended");
            }
        }

        if self.processing {
            return;
        }

        self.start_listening();
    }

    /// User interrupt: cut speech short and listen again
    pub fn on_user_interrupt(&mut self) {
        if self.synthesizer.is_speaking() {
            tracing::info!("speech interrupted");
            self.synthesizer.cancel();
            self.processing = false;
            self.start_listening();
        } else if self.state == LoopState::Processing && self.config.interrupt_during_processing {
            tracing::info!("pending response cancelled");
            self.cancel_pending();
            self.processing = false;
            self.start_listening();
        } else {
            tracing::debug!(state = %self.state, "nothing to interrupt");
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }

    /// Abort everything in flight and return to `Idle`
    pub fn shutdown(&mut self) {
        self.cancel_pending();
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
        self.stop_listening();
        if self.synthesizer.is_speaking() {
            self.synthesizer.cancel();
        }
        self.processing = false;
        self.state = LoopState::Idle;
        tracing::info!("voice loop stopped");
    }
}
