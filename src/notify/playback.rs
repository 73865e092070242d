use super::{log_event, Notifier};
use crate::lock::lock_or_recover;
use crate::streak::TrackerEvent;
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const QUEUE_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The output device is missing or was lost; a reinit may fix it.
    #[error("sound output not initialized: {0}")]
    NotInitialized(String),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error("sound playback failed: {0}")]
    Stream(String),
}

/// One sound to play, in queue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRequest {
    pub label: String,
    pub sound: PathBuf,
}

/// Output device that can play a clip to completion.
pub trait SoundBackend {
    /// Block until the clip finished or `cancel` is set.
    fn play(&mut self, sound: &Path, cancel: &AtomicBool) -> Result<(), PlaybackError>;
    fn reinit(&mut self) -> Result<(), PlaybackError>;
}

/// Play once; on [`PlaybackError::NotInitialized`] reinitialize and retry exactly once.
pub fn play_with_retry(
    backend: &mut dyn SoundBackend,
    request: &PlayRequest,
    cancel: &AtomicBool,
) -> Result<(), PlaybackError> {
    info!(sound = %request.sound.display(), "Playing sound: {}", request.label);
    match backend.play(&request.sound, cancel) {
        Err(PlaybackError::NotInitialized(reason)) => {
            warn!("{reason}; reinitializing sound output");
            backend.reinit()?;
            info!("Retrying sound after reinitialization");
            backend.play(&request.sound, cancel)
        }
        other => other,
    }
}

/// Plays milestone sounds on a dedicated worker thread, strictly in arrival order.
pub struct PlaybackQueue {
    sender: Mutex<Option<Sender<PlayRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    cancel: Arc<AtomicBool>,
}

impl PlaybackQueue {
    /// `make_backend` runs on the worker thread, so the backend never crosses threads.
    pub fn spawn<F>(make_backend: F) -> io::Result<Self>
    where
        F: FnOnce() -> Box<dyn SoundBackend> + Send + 'static,
    {
        let (sender, receiver) = bounded::<PlayRequest>(QUEUE_CAPACITY);
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = cancel.clone();
        let worker = thread::Builder::new()
            .name("sound-playback".into())
            .spawn(move || {
                let mut backend = make_backend();
                for request in receiver {
                    if worker_cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Err(err) = play_with_retry(backend.as_mut(), &request, &worker_cancel) {
                        error!("Error playing sound {}: {err}", request.sound.display());
                    }
                }
                debug!("sound playback worker stopped");
            })?;
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            cancel,
        })
    }

    pub fn enqueue(&self, request: PlayRequest) {
        let guard = lock_or_recover(&self.sender, "playback sender");
        let Some(sender) = guard.as_ref() else {
            debug!(label = %request.label, "playback queue closed; sound skipped");
            return;
        };
        match sender.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(request)) => {
                warn!(label = %request.label, "playback queue full; sound skipped");
            }
            Err(TrySendError::Disconnected(request)) => {
                warn!(label = %request.label, "playback worker gone; sound skipped");
            }
        }
    }

    /// Close the queue, let queued sounds finish, and join the worker.
    pub fn finish(&self) {
        lock_or_recover(&self.sender, "playback sender").take();
        if let Some(worker) = lock_or_recover(&self.worker, "playback worker").take() {
            if worker.join().is_err() {
                error!("sound playback worker panicked");
            }
        }
    }

    /// Stop the current sound, drop the queue, and join the worker.
    pub fn abort(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.finish();
    }
}

impl Notifier for PlaybackQueue {
    fn notify(&self, event: &TrackerEvent) {
        log_event(event);
        if let TrackerEvent::Milestone { milestone, .. } = event {
            self.enqueue(PlayRequest {
                label: milestone.label.clone(),
                sound: milestone.sound.clone(),
            });
        }
    }
}

impl Drop for PlaybackQueue {
    fn drop(&mut self) {
        self.abort();
    }
}
