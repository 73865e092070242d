//! CPAL output playback of WAV milestone clips.

use super::playback::{PlaybackError, SoundBackend};
use crate::audio::resample_linear;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Decoded mono clip.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SoundClip {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// Decode a WAV file (integer or float PCM) and downmix it to mono.
pub fn load_wav(path: &Path) -> Result<SoundClip, PlaybackError> {
    let decode = |source| PlaybackError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = hound::WavReader::open(path).map_err(decode)?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(decode)?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(decode)?
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok(SoundClip {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Default output device, reopened on demand after device loss.
pub struct CpalPlayer {
    device: Option<cpal::Device>,
}

impl CpalPlayer {
    pub fn new() -> Self {
        let mut player = Self { device: None };
        if let Err(err) = player.reinit() {
            warn!("{err}");
        }
        player
    }
}

impl Default for CpalPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundBackend for CpalPlayer {
    fn reinit(&mut self) -> Result<(), PlaybackError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlaybackError::NotInitialized("no default output device".into()))?;
        info!(
            device = %device.name().unwrap_or_else(|_| "unknown output device".into()),
            "sound output initialized"
        );
        self.device = Some(device);
        Ok(())
    }

    fn play(&mut self, sound: &Path, cancel: &AtomicBool) -> Result<(), PlaybackError> {
        let Some(device) = self.device.as_ref() else {
            return Err(PlaybackError::NotInitialized(
                "output device not opened".into(),
            ));
        };
        let clip = load_wav(sound)?;
        let supported = device
            .default_output_config()
            .map_err(|err| PlaybackError::NotInitialized(err.to_string()))?;
        let format = supported.sample_format();
        let config: StreamConfig = supported.config();
        let output_rate = config.sample_rate.0;
        let samples = Arc::new(resample_linear(&clip.samples, clip.sample_rate, output_rate));
        let expected = Duration::from_secs_f64(samples.len() as f64 / f64::from(output_rate.max(1)));

        let (done_tx, done_rx) = bounded::<()>(1);
        let (err_tx, err_rx) = bounded::<String>(4);
        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(device, &config, samples, done_tx, err_tx),
            SampleFormat::I16 => build_stream::<i16>(device, &config, samples, done_tx, err_tx),
            SampleFormat::U16 => build_stream::<u16>(device, &config, samples, done_tx, err_tx),
            other => {
                return Err(PlaybackError::Stream(format!(
                    "unsupported output sample format: {other:?}"
                )))
            }
        }
        .map_err(|err| match err {
            cpal::BuildStreamError::DeviceNotAvailable => {
                PlaybackError::NotInitialized(err.to_string())
            }
            other => PlaybackError::Stream(other.to_string()),
        })?;
        stream.play().map_err(|err| match err {
            cpal::PlayStreamError::DeviceNotAvailable => {
                PlaybackError::NotInitialized(err.to_string())
            }
            other => PlaybackError::Stream(other.to_string()),
        })?;

        let deadline = Instant::now() + expected + DRAIN_GRACE;
        loop {
            if cancel.load(Ordering::SeqCst) {
                debug!("sound playback cancelled");
                break;
            }
            match done_rx.recv_timeout(POLL_INTERVAL) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if let Ok(err) = err_rx.try_recv() {
                        return Err(PlaybackError::Stream(err));
                    }
                    if Instant::now() >= deadline {
                        debug!("sound playback deadline reached");
                        break;
                    }
                }
            }
        }
        drop(stream);
        Ok(())
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    samples: Arc<Vec<f32>>,
    done: Sender<()>,
    errors: Sender<String>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels.max(1));
    let mut cursor = 0usize;
    device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            for frame in data.chunks_mut(channels) {
                let value = samples.get(cursor).copied().unwrap_or(0.0);
                cursor = cursor.saturating_add(1);
                for out in frame.iter_mut() {
                    *out = T::from_sample_(value);
                }
            }
            if cursor >= samples.len() {
                let _ = done.try_send(());
            }
        },
        move |err| {
            let _ = errors.try_send(err.to_string());
        },
        None,
    )
}
