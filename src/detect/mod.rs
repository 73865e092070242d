//! Zap classification: frequency-domain and envelope analysis of a single frame.
//!
//! Electrical zaps are short, dominated by energy above 5 kHz, and have exactly one sharp
//! transient with a fast attack and decay. Everything here is pure and safe to call from any
//! thread.

mod classifier;
mod peaks;
mod spectrum;

pub use classifier::{ClassifierConfig, DetectionFeatures, RejectReason, SignalClassifier};
pub use peaks::find_peaks;
pub use spectrum::{BandEnergy, PowerSpectrum};
