//! Signal handling for graceful shutdown (SIGINT/SIGTERM)
//!
//! On the first signal the listener stops accepting connections and waits
//! for in-flight handlers, which still delete the jobs they submitted.
//! A second signal exits immediately.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Exit code used when a second signal forces an immediate exit
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared shutdown state
#[derive(Debug, Default)]
pub struct ShutdownState {
    /// First signal received (stop accepting)
    shutdown_requested: AtomicBool,
    /// Signal count (for tracking double-SIGINT)
    signal_count: AtomicU8,
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: stop accepting, drain handlers
    Drain,
    /// Second signal: exit immediately
    ImmediateExit,
    /// Third+ signal: ignore
    Ignore,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Request shutdown without a signal (tests, embedding).
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    /// Handle a signal (SIGINT/SIGTERM)
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);

        match count {
            0 => {
                self.shutdown_requested.store(true, Ordering::SeqCst);
                SignalAction::Drain
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }
}

/// Install SIGINT/SIGTERM handlers that drive `state`.
///
/// Must be called once at program startup.
pub fn install(state: Arc<ShutdownState>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || match state.handle_signal() {
        SignalAction::Drain => {
            tracing::warn!("received interrupt signal, draining in-flight jobs");
        }
        SignalAction::ImmediateExit => {
            tracing::error!("received second interrupt, exiting immediately");
            std::process::exit(EXIT_CODE_INTERRUPTED);
        }
        SignalAction::Ignore => {}
    })
}
