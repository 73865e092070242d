//! Microphone capture feeding the zap classifier.
//!
//! Audio is captured via CPAL, downmixed to mono f32, sliced into fixed-size frames on the
//! callback thread, and handed to the capture loop through a bounded channel.

/// Capture rate the classifier thresholds were tuned at.
pub const DEFAULT_CAPTURE_RATE: u32 = 16_000;

mod dispatch;
mod frame;
mod meter;
mod recorder;
mod resample;
mod source;

pub use frame::AudioFrame;
pub use meter::rms_volume;
pub use recorder::{list_input_devices, mic_permission_hint, CpalBackend, CpalSource};
pub(crate) use resample::resample_linear;
pub use source::{AudioBackend, AudioSource, AudioSourceConfig, SourceError};
