pub mod audio;
pub mod config;
pub mod detect;
mod lock;
pub mod notify;
pub mod pipeline;
pub mod shutdown;
pub mod store;
pub mod streak;
pub mod telemetry;
pub mod terminal_restore;

pub use pipeline::{CaptureLoop, CaptureStats};
pub use shutdown::Shutdown;
pub use streak::{DetectionOutcome, KillTracker};
