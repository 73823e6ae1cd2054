//! Ctrl+C handling.
//!
//! A single shared `AtomicBool` is set when the user interrupts. The walker,
//! the fingerprint pool and every action check it between files, finish the
//! file in hand and return with `interrupted` set; the binary then exits with
//! code 130. An interrupted consolidation never writes its index.
//!
//! ```rust,no_run
//! use tombraider::signal::install_handler;
//!
//! let handler = install_handler()?;
//! let flag = handler.flag();
//! // hand `flag` to ConsolidateConfig::with_shutdown_flag
//! # Ok::<(), tombraider::signal::SignalError>(())
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code after an interrupt (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown was requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// The flag to hand to long-running work.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// The Ctrl+C handler could not be registered.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler, or reuse the installed one.
///
/// The returned handler starts cleared. Repeated calls (one per `run_app` in
/// tests) share one flag.
///
/// # Errors
///
/// Returns [`SignalError`] if the first registration fails for a reason other
/// than a handler already being present.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.flag();
    let registered = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "\nInterrupted; finishing the current file...");
        let _ = stderr.flush();
    });

    match registered {
        Ok(()) => {}
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered; using an unhooked flag");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(GLOBAL_HANDLER.get_or_init(|| handler).clone())
}
