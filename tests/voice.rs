//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

use std::io::Cursor;

use voiceloop::voice::{
    EndpointConfig, EndpointDetector, EndpointState, SAMPLE_RATE, decode_mp3, samples_to_wav,
};

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate low-level background noise
fn generate_background(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.01; num_samples]
}

/// Detector that has already calibrated on one second of background
fn calibrated_detector() -> EndpointDetector {
    let mut detector = EndpointDetector::new(EndpointConfig::default());
    let state = detector.push(&generate_background(1.0));
    assert_eq!(state, EndpointState::Waiting);
    detector
}

#[test]
fn test_background_does_not_trigger() {
    let mut detector = calibrated_detector();

    let state = detector.push(&generate_background(3.0));
    assert_eq!(state, EndpointState::Waiting);
    assert!(detector.take_utterance().is_empty());
}

#[test]
fn test_speech_onset_starts_recording() {
    let mut detector = calibrated_detector();

    let state = detector.push(&generate_sine_samples(440.0, 0.5, 0.3));
    assert_eq!(state, EndpointState::Recording);
}

#[test]
fn test_trailing_silence_completes_utterance() {
    let mut detector = calibrated_detector();

    detector.push(&generate_sine_samples(440.0, 1.0, 0.3));
    assert_eq!(detector.state(), EndpointState::Recording);

    // One second of silence is not enough
    detector.push(&generate_background(1.0));
    assert_eq!(detector.state(), EndpointState::Recording);

    detector.push(&generate_background(0.5));
    assert_eq!(detector.state(), EndpointState::Complete);

    // Speech plus the trailing silence
    let utterance = detector.take_utterance();
    assert_eq!(utterance.len(), (SAMPLE_RATE as usize * 5) / 2);
}

#[test]
fn test_pause_shorter_than_silence_keeps_recording() {
    let mut detector = calibrated_detector();

    detector.push(&generate_sine_samples(440.0, 1.0, 0.3));
    detector.push(&generate_background(1.0));
    detector.push(&generate_sine_samples(440.0, 1.0, 0.3));
    detector.push(&generate_background(1.0));
    assert_eq!(detector.state(), EndpointState::Recording);
}

#[test]
fn test_no_speech_times_out() {
    let mut detector = EndpointDetector::new(EndpointConfig::default());

    let state = detector.push(&generate_background(10.0));
    assert_eq!(state, EndpointState::TimedOut);
    assert!(state.is_finished());
    assert!(detector.take_utterance().is_empty());

    // Finished detectors ignore further audio
    let state = detector.push(&generate_sine_samples(440.0, 1.0, 0.3));
    assert_eq!(state, EndpointState::TimedOut);
}

#[test]
fn test_continuous_speech_capped_at_max_duration() {
    let mut detector = calibrated_detector();

    let state = detector.push(&generate_sine_samples(440.0, 12.0, 0.3));
    assert_eq!(state, EndpointState::Complete);

    // Cap is measured from speech onset
    let utterance = detector.take_utterance();
    assert_eq!(utterance.len(), SAMPLE_RATE as usize * 10);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // WAV should have reasonable size
    assert!(wav_data.len() > 44); // WAV header is 44 bytes
}

#[test]
fn test_wav_readback() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    let cursor = Cursor::new(wav_data);
    let mut reader = hound::WavReader::new(cursor).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
    assert_eq!(read_samples[0], 0);
    assert!(read_samples[1] > 0);
    assert!(read_samples[2] < 0);
}

#[test]
fn test_decode_mp3_rejects_garbage() {
    assert!(decode_mp3(&[]).is_err());
    assert!(decode_mp3(b"definitely not an mp3").is_err());
}
