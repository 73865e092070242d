//! Cooperative shutdown shared by every background thread.

use crate::lock::lock_or_recover;
use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Set by the SIGINT/SIGTERM handler; the main loop turns it into a [`Shutdown`] trigger.
static TERMINATION_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Cloneable stop signal. Triggering drops the only sender, which wakes every thread
/// blocked in [`Shutdown::wait_timeout`] or selecting on [`Shutdown::receiver`].
#[derive(Clone)]
pub struct Shutdown {
    triggered: Arc<AtomicBool>,
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver,
        }
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        lock_or_recover(&self.sender, "shutdown sender").take();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Disconnects when shutdown is triggered; never yields a message.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }

    /// Sleep up to `timeout`. Returns true if shutdown was triggered meanwhile.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => self.is_triggered(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
extern "C" fn handle_termination(_: libc::c_int) {
    TERMINATION_REQUESTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to [`take_termination_request`].
#[cfg(unix)]
pub fn install_termination_handlers() -> Result<()> {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        unsafe {
            // SAFETY: handle_termination only stores to an atomic, which is async-signal-safe.
            let handler = handle_termination as *const () as libc::sighandler_t;
            if libc::signal(signal, handler) == libc::SIG_ERR {
                anyhow::bail!("failed to install handler for signal {signal}");
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn install_termination_handlers() -> Result<()> {
    Ok(())
}

pub fn take_termination_request() -> bool {
    TERMINATION_REQUESTED.swap(false, Ordering::SeqCst)
}

/// Flag a termination request from code (the test-mode key handler uses this).
pub fn request_termination() {
    TERMINATION_REQUESTED.store(true, Ordering::SeqCst);
}
