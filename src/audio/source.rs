use super::AudioFrame;
use std::time::Duration;

/// Parameters for opening a capture source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSourceConfig {
    /// Device name; `None` picks the host default input.
    pub device: Option<String>,
    pub channels: u16,
    pub sample_rate: u32,
    /// Samples per frame at `sample_rate`.
    pub frame_samples: usize,
    pub channel_capacity: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("audio stream disconnected")]
    Disconnected,
    #[error("audio stream error: {0}")]
    Stream(String),
}

/// A live stream of frames. Implementations may be `!Send` (CPAL streams are), so the
/// capture loop opens them on its own thread.
pub trait AudioSource {
    /// Wait up to `timeout` for the next frame. `Ok(None)` means nothing arrived in time.
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<AudioFrame>, SourceError>;

    fn name(&self) -> String {
        "unknown_source".to_string()
    }
}

/// Opens (and re-opens) capture sources.
pub trait AudioBackend: Send {
    fn open(&mut self, config: &AudioSourceConfig) -> anyhow::Result<Box<dyn AudioSource>>;
}
