//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// How often playback checks for completion or a stop request
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Decoded mono audio ready for playback
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,

    /// Sample rate of `samples`
    pub sample_rate: u32,
}

/// How a playback call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// All samples were played
    Finished,
    /// The stop flag was raised first
    Stopped,
}

/// Plays audio to the default output device
///
/// Blocking; the `cpal` stream lives only for the duration of one call.
pub struct AudioPlayback {
    config: StreamConfig,
    sample_rate: u32,
}

impl AudioPlayback {
    /// Create a playback instance for the given sample rate
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new(sample_rate: u32) -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let rate_ok = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        };

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| c.channels() == 1 && rate_ok(c))
            .or_else(|| {
                // Fallback: try stereo
                device
                    .supported_output_configs()
                    .ok()?
                    .find(|c| c.channels() == 2 && rate_ok(c))
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            config,
            sample_rate,
        })
    }

    /// Play samples, blocking until done or until `stop` is raised
    ///
    /// # Errors
    ///
    /// Returns error if the output stream fails
    pub fn play_blocking(&self, samples: Vec<f32>, stop: &AtomicBool) -> Result<PlaybackOutcome> {
        if samples.is_empty() {
            return Ok(PlaybackOutcome::Finished);
        }

        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let channels = self.config.channels as usize;
        let sample_count = samples.len();
        let finished = Arc::new(AtomicBool::new(false));
        let finished_cb = Arc::clone(&finished);
        let mut position = 0usize;

        let stream = device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(position).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        if position < samples.len() {
                            position += 1;
                        } else {
                            finished_cb.store(true, Ordering::Release);
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(self.sample_rate);
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();

        let outcome = loop {
            if stop.load(Ordering::Acquire) {
                break PlaybackOutcome::Stopped;
            }
            if finished.load(Ordering::Acquire) || start.elapsed() > timeout {
                // Small delay to let the device drain
                std::thread::sleep(Duration::from_millis(100));
                break PlaybackOutcome::Finished;
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        drop(stream);
        tracing::debug!(samples = sample_count, ?outcome, "playback ended");

        Ok(outcome)
    }
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the data is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                #[allow(clippy::cast_sign_loss)]
                sample_rate.get_or_insert(frame.sample_rate as u32);

                if frame.channels == 2 {
                    // Stereo: average channels
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| Error::Audio("MP3 contained no audio frames".to_string()))?;

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}
