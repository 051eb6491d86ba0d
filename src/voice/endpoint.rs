//! Utterance endpoint detection
//!
//! Splits a microphone stream into a single utterance using an adaptive
//! energy threshold: background energy is calibrated from the first few
//! chunks, speech is any chunk louder than `energy_ratio` times that
//! background, and trailing silence or a hard duration cap ends capture.

use super::SAMPLE_RATE;
use crate::{Error, Result};

/// Endpoint detection parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    /// Analysis chunk length in milliseconds
    pub chunk_ms: u32,

    /// Trailing silence that completes an utterance
    pub silence_secs: f32,

    /// Hard cap, measured from speech onset (or session start if no speech yet)
    pub max_duration_secs: f32,

    /// Short-term / long-term energy ratio that counts as speech
    pub energy_ratio: f32,

    /// Chunks used to calibrate background energy
    pub calibration_chunks: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            chunk_ms: 500,
            silence_secs: 1.5,
            max_duration_secs: 10.0,
            energy_ratio: 1.5,
            calibration_chunks: 2,
        }
    }
}

impl EndpointConfig {
    /// Samples per analysis chunk at [`SAMPLE_RATE`]
    #[must_use]
    pub fn chunk_samples(&self) -> usize {
        (SAMPLE_RATE as usize * self.chunk_ms as usize) / 1000
    }

    /// Check that the parameters describe a usable detector
    ///
    /// # Errors
    ///
    /// Returns error if any parameter is zero or negative
    pub fn validate(&self) -> Result<()> {
        if self.chunk_samples() == 0 {
            return Err(Error::Config("recognizer chunk_ms must be positive".to_string()));
        }
        if self.silence_secs <= 0.0 || self.max_duration_secs <= 0.0 {
            return Err(Error::Config(
                "recognizer silence_secs and max_duration_secs must be positive".to_string(),
            ));
        }
        if self.energy_ratio <= 0.0 {
            return Err(Error::Config("recognizer energy_ratio must be positive".to_string()));
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn secs_to_samples(secs: f32) -> usize {
        (secs * SAMPLE_RATE as f32) as usize
    }
}

/// State of the endpoint detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Measuring background energy
    Calibrating,
    /// Waiting for speech onset
    Waiting,
    /// Speech detected, accumulating the utterance
    Recording,
    /// Utterance finished (trailing silence or duration cap after speech)
    Complete,
    /// Duration cap reached without any speech
    TimedOut,
}

impl EndpointState {
    /// Whether the detector will accept no more audio
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Complete | Self::TimedOut)
    }
}

/// Detects the start and end of one spoken utterance
pub struct EndpointDetector {
    config: EndpointConfig,
    state: EndpointState,
    pending: Vec<f32>,
    calibration: Vec<f32>,
    calibrated_chunks: usize,
    long_term_energy: f32,
    speech: Vec<f32>,
    silence_samples: usize,
    elapsed_samples: usize,
}

impl EndpointDetector {
    /// Create a detector in the calibrating state
    #[must_use]
    pub fn new(config: EndpointConfig) -> Self {
        let state = if config.calibration_chunks == 0 {
            EndpointState::Waiting
        } else {
            EndpointState::Calibrating
        };

        Self {
            config,
            state,
            pending: Vec::new(),
            calibration: Vec::new(),
            calibrated_chunks: 0,
            long_term_energy: 0.0,
            speech: Vec::new(),
            silence_samples: 0,
            elapsed_samples: 0,
        }
    }

    /// Feed captured samples of any length
    ///
    /// Samples are analysed in fixed chunks; a trailing partial chunk is held
    /// until the next call.
    pub fn push(&mut self, samples: &[f32]) -> EndpointState {
        if self.state.is_finished() {
            return self.state;
        }

        self.pending.extend_from_slice(samples);
        let chunk_len = self.config.chunk_samples();

        while self.pending.len() >= chunk_len && !self.state.is_finished() {
            let chunk: Vec<f32> = self.pending.drain(..chunk_len).collect();
            self.process_chunk(&chunk);
        }

        self.state
    }

    fn process_chunk(&mut self, chunk: &[f32]) {
        self.elapsed_samples += chunk.len();

        if self.state == EndpointState::Calibrating {
            self.calibration.extend_from_slice(chunk);
            self.calibrated_chunks += 1;
            if self.calibrated_chunks >= self.config.calibration_chunks {
                self.long_term_energy = mean_energy(&self.calibration);
                self.calibration = Vec::new();
                self.state = EndpointState::Waiting;
                tracing::trace!(long_term_energy = self.long_term_energy, "calibrated");
            }
            self.check_duration();
            return;
        }

        let energy = mean_energy(chunk);
        let is_speech = energy > self.long_term_energy * self.config.energy_ratio;

        if is_speech {
            if self.state == EndpointState::Waiting {
                tracing::debug!(energy, "speech detected, recording");
                self.state = EndpointState::Recording;
                self.elapsed_samples = chunk.len();
            }
            self.speech.extend_from_slice(chunk);
            self.silence_samples = 0;
        } else if self.state == EndpointState::Recording {
            self.speech.extend_from_slice(chunk);
            self.silence_samples += chunk.len();
            if self.silence_samples >= EndpointConfig::secs_to_samples(self.config.silence_secs) {
                tracing::debug!(
                    samples = self.speech.len(),
                    "silence detected, utterance complete"
                );
                self.state = EndpointState::Complete;
                return;
            }
        }

        self.check_duration();
    }

    fn check_duration(&mut self) {
        if self.elapsed_samples < EndpointConfig::secs_to_samples(self.config.max_duration_secs) {
            return;
        }

        self.state = if self.state == EndpointState::Recording {
            tracing::debug!("max duration reached, utterance complete");
            EndpointState::Complete
        } else {
            tracing::debug!("max duration reached without speech");
            EndpointState::TimedOut
        };
    }

    /// Take the captured utterance, leaving the buffer empty
    pub fn take_utterance(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.speech)
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> EndpointState {
        self.state
    }

    /// Calibrated background energy
    #[must_use]
    pub const fn long_term_energy(&self) -> f32 {
        self.long_term_energy
    }
}

/// Mean squared amplitude of a block of samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn mean_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    sum_squares / samples.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(config: &EndpointConfig, amplitude: f32) -> Vec<f32> {
        vec![amplitude; config.chunk_samples()]
    }

    #[test]
    fn test_energy_calculation() {
        assert!(mean_energy(&[0.0; 100]) < f32::EPSILON);
        assert!((mean_energy(&[0.5; 100]) - 0.25).abs() < 1e-6);
        assert!(mean_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn test_calibration_then_waiting() {
        let config = EndpointConfig::default();
        let mut detector = EndpointDetector::new(config.clone());
        assert_eq!(detector.state(), EndpointState::Calibrating);

        detector.push(&chunk(&config, 0.01));
        assert_eq!(detector.state(), EndpointState::Calibrating);
        detector.push(&chunk(&config, 0.01));
        assert_eq!(detector.state(), EndpointState::Waiting);
        assert!((detector.long_term_energy() - 0.0001).abs() < 1e-6);
    }

    #[test]
    fn test_partial_chunks_are_buffered() {
        let config = EndpointConfig::default();
        let mut detector = EndpointDetector::new(config.clone());
        let half = config.chunk_samples() / 2;

        detector.push(&vec![0.01; half]);
        detector.push(&vec![0.01; half]);
        detector.push(&vec![0.01; config.chunk_samples()]);
        assert_eq!(detector.state(), EndpointState::Waiting);
    }

    #[test]
    fn test_zero_calibration_starts_waiting() {
        let config = EndpointConfig {
            calibration_chunks: 0,
            ..EndpointConfig::default()
        };
        let detector = EndpointDetector::new(config);
        assert_eq!(detector.state(), EndpointState::Waiting);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EndpointConfig {
            chunk_ms: 0,
            ..EndpointConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(EndpointConfig::default().validate().is_ok());
    }
}
