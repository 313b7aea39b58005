// SPDX-License-Identifier: MIT OR Apache-2.0

//! The side channel for failures of the logging machinery itself.
//!
//! When a handler fails, the failure cannot be logged through the handlers, and it must
//! not be returned to the code that wrote the line. Instead it becomes a [`Diagnostic`]
//! and is delivered according to the manager's [`DiagnosticMode`]:
//!
//! - [`DiagnosticMode::Reporter`] (the default) sends it to a background thread named
//!   `linewise-diagnostics` that writes it to stderr. The writing thread only pays for
//!   a channel send.
//! - [`DiagnosticMode::Hook`] calls a user function synchronously on the dispatching
//!   thread, after the registry lock has been released.
//! - [`DiagnosticMode::Silent`] discards it.
//!
//! # Example
//!
//! ```rust
//! use linewise::{Diagnostic, DiagnosticMode, Manager, ManagerConfig};
//! use std::sync::{Arc, Mutex};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! let config = ManagerConfig::default().with_diagnostics(DiagnosticMode::hook(
//!     move |d: &Diagnostic| sink.lock().unwrap().push(d.to_string()),
//! ));
//! let manager = Manager::with_config("diagnostics-doc", config);
//! // an invalid literal is rejected before reaching any handler
//! manager.literal(5, b"abc");
//! assert_eq!(seen.lock().unwrap().len(), 1);
//! ```

use crate::error::{EmissionError, HandlerFailure, HandlerWriteError};
use crate::manager::HandlerHandle;
use crate::sys::{Duration, Instant};
use std::fmt::{Debug, Display};
use std::sync::{Arc, OnceLock};

use wasm_safe_mutex::mpsc;

/// Something went wrong inside the logging machinery.
#[non_exhaustive]
#[derive(Debug)]
pub enum Diagnostic {
    /// One or more handlers failed during a fan-out. The other handlers still
    /// received the emission.
    HandlerFailures {
        subsystem: String,
        failures: Vec<HandlerFailure>,
    },
    /// A dispatch was rejected before reaching any handler.
    Rejected {
        subsystem: String,
        error: EmissionError,
    },
    /// A lifecycle hook ([`on_remove`](crate::Handler::on_remove),
    /// [`prepare_to_die`](crate::Handler::prepare_to_die), ...) failed or panicked.
    HookFailed {
        subsystem: String,
        hook: &'static str,
        handler: String,
        handle: HandlerHandle,
        error: HandlerWriteError,
    },
    /// A configuration value was ignored.
    Config { subsystem: String, message: String },
}

impl Diagnostic {
    pub fn subsystem(&self) -> &str {
        match self {
            Diagnostic::HandlerFailures { subsystem, .. }
            | Diagnostic::Rejected { subsystem, .. }
            | Diagnostic::HookFailed { subsystem, .. }
            | Diagnostic::Config { subsystem, .. } => subsystem,
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::HandlerFailures {
                subsystem,
                failures,
            } => {
                write!(f, "linewise[{}]: {} handler(s) failed", subsystem, failures.len())?;
                for failure in failures {
                    write!(f, "; {}", failure)?;
                }
                Ok(())
            }
            Diagnostic::Rejected { subsystem, error } => {
                write!(f, "linewise[{}]: emission rejected: {}", subsystem, error)
            }
            Diagnostic::HookFailed {
                subsystem,
                hook,
                handler,
                handle,
                error,
            } => write!(
                f,
                "linewise[{}]: {} of {} ({}) failed: {}",
                subsystem, hook, handler, handle, error
            ),
            Diagnostic::Config { subsystem, message } => {
                write!(f, "linewise[{}]: config: {}", subsystem, message)
            }
        }
    }
}

/// Where a manager sends its [`Diagnostic`]s.
#[derive(Clone, Default)]
pub enum DiagnosticMode {
    /// Background stderr reporter.
    #[default]
    Reporter,
    /// Called on the dispatching thread.
    Hook(Arc<dyn Fn(&Diagnostic) + Send + Sync>),
    /// Dropped.
    Silent,
}

impl DiagnosticMode {
    pub fn hook<F>(f: F) -> Self
    where
        F: Fn(&Diagnostic) + Send + Sync + 'static,
    {
        DiagnosticMode::Hook(Arc::new(f))
    }

    pub(crate) fn deliver(&self, diagnostic: Diagnostic) {
        match self {
            DiagnosticMode::Reporter => {
                // Ignore send failures; the reporter is best effort.
                let _ = reporter().send_sync(diagnostic);
            }
            DiagnosticMode::Hook(hook) => hook(&diagnostic),
            DiagnosticMode::Silent => {}
        }
    }
}

impl Debug for DiagnosticMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticMode::Reporter => f.write_str("Reporter"),
            DiagnosticMode::Hook(_) => f.write_str("Hook(..)"),
            DiagnosticMode::Silent => f.write_str("Silent"),
        }
    }
}

static REPORTER: OnceLock<mpsc::Sender<Diagnostic>> = OnceLock::new();

fn reporter() -> mpsc::Sender<Diagnostic> {
    REPORTER
        .get_or_init(|| {
            let (tx, rx) = mpsc::channel();
            crate::sys::spawn_named("linewise-diagnostics", move || reporter_loop(rx));
            tx
        })
        .clone()
}

fn reporter_loop(receiver: mpsc::Receiver<Diagnostic>) {
    loop {
        let deadline = Instant::now() + Duration::from_millis(250);
        match receiver.recv_sync_timeout(deadline) {
            Ok(diagnostic) => write_to_console(&diagnostic),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn write_to_console(diagnostic: &Diagnostic) {
    #[cfg(not(target_arch = "wasm32"))]
    {
        use std::io::Write;
        let mut lock = std::io::stderr().lock();
        // nowhere left to report a failure to
        let _ = writeln!(lock, "{}", diagnostic);
    }
    #[cfg(target_arch = "wasm32")]
    {
        web_sys::console::warn_1(&diagnostic.to_string().into());
    }
}
