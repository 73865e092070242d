//! System microphone capture via CPAL.
//!
//! Handles device lookup, stream format negotiation, and conversion of every supported
//! sample type to mono f32 frames.

use super::dispatch::FrameDispatcher;
use super::{AudioBackend, AudioFrame, AudioSource, AudioSourceConfig, SourceError};
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

const STREAM_ERROR_CAPACITY: usize = 8;

/// List microphone names so the CLI can expose a human-friendly selector.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host.input_devices().context("no input devices available")?;
    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            names.push(name);
        }
    }
    Ok(names)
}

pub fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check ALSA/PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}

/// Opens CPAL input streams on demand.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    fn open(&mut self, config: &AudioSourceConfig) -> Result<Box<dyn AudioSource>> {
        Ok(Box::new(CpalSource::open(config)?))
    }
}

/// A running CPAL input stream plus the channel its callback feeds.
pub struct CpalSource {
    stream: cpal::Stream,
    device_name: String,
    receiver: Receiver<AudioFrame>,
    errors: Receiver<String>,
    dropped: Arc<AtomicUsize>,
    reported_drops: usize,
}

impl CpalSource {
    pub fn open(config: &AudioSourceConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = match config.device.as_deref() {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))?
            }
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };
        let device_name = device
            .name()
            .unwrap_or_else(|_| "unknown input device".to_string());

        let (stream_config, format) = choose_stream_config(&device, config.sample_rate)?;
        let device_rate = stream_config.sample_rate.0;
        let channels = usize::from(stream_config.channels.max(1));
        // Keep the frame duration constant when the device refuses the requested rate.
        let frame_samples = ((config.frame_samples as u64 * u64::from(device_rate))
            / u64::from(config.sample_rate.max(1)))
        .max(1) as usize;

        info!(
            device = %device_name,
            ?format,
            sample_rate = device_rate,
            channels,
            frame_samples,
            "opening audio input stream"
        );

        let (sender, receiver) = bounded::<AudioFrame>(config.channel_capacity.max(1));
        let (err_tx, errors) = bounded::<String>(STREAM_ERROR_CAPACITY);
        let dropped = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Mutex::new(FrameDispatcher::new(
            frame_samples,
            device_rate,
            sender,
            dropped.clone(),
        )));

        let err_fn = move |err: cpal::StreamError| {
            let _ = err_tx.try_send(err.to_string());
        };
        let stream = match format {
            SampleFormat::F32 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::I16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample as f32 / 32_768.0);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::U16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[u16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| {
                                (sample as f32 - 32_768.0) / 32_768.0
                            });
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        };

        stream
            .play()
            .with_context(|| format!("failed to start capture on '{device_name}'"))?;

        Ok(Self {
            stream,
            device_name,
            receiver,
            errors,
            dropped,
            reported_drops: 0,
        })
    }
}

impl AudioSource for CpalSource {
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<AudioFrame>, SourceError> {
        match self.errors.try_recv() {
            Ok(err) => return Err(SourceError::Stream(err)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }

        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > self.reported_drops {
            debug!(
                dropped_total = dropped,
                "capture loop fell behind; frames dropped"
            );
            self.reported_drops = dropped;
        }

        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Disconnected),
        }
    }

    fn name(&self) -> String {
        self.device_name.clone()
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        if let Err(err) = self.stream.pause() {
            debug!("failed to pause audio stream: {err}");
        }
    }
}

/// Prefer a config that supports the requested rate with the fewest channels; fall back to
/// the device default (the frame carries its real rate, so the classifier still works).
fn choose_stream_config(
    device: &cpal::Device,
    requested_rate: u32,
) -> Result<(StreamConfig, SampleFormat)> {
    let requested = SampleRate(requested_rate);
    if let Ok(ranges) = device.supported_input_configs() {
        let mut candidates: Vec<_> = ranges
            .filter(|range| {
                matches!(
                    range.sample_format(),
                    SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
                ) && range.min_sample_rate() <= requested
                    && range.max_sample_rate() >= requested
            })
            .collect();
        candidates.sort_by_key(|range| range.channels());
        if let Some(range) = candidates.into_iter().next() {
            let supported = range.with_sample_rate(requested);
            return Ok((supported.config(), supported.sample_format()));
        }
    }

    let default_config = device
        .default_input_config()
        .context("no default input config available")?;
    warn!(
        requested_rate,
        fallback_rate = default_config.sample_rate().0,
        "requested sample rate unsupported; using device default"
    );
    Ok((default_config.config(), default_config.sample_format()))
}
