// SPDX-License-Identifier: MIT OR Apache-2.0

//! # In-Memory Handler
//!
//! This module provides an in-memory handler for testing and debugging purposes.
//! The `InMemoryHandler` keeps every emission it receives, context included, rather
//! than writing it anywhere, making it ideal for:
//!
//! - Unit testing code that logs through a [`Manager`](crate::Manager)
//! - Checking the order and completeness of what a manager delivered
//! - Capturing logs in environments where stderr is redirected or unavailable
//! - Debugging in adversarial environments (e.g., WASM in browsers)
//!
//! ## Architecture
//!
//! Lines and literals are kept in two `wasm_safe_mutex::Mutex<Vec<_>>`s, which spin
//! instead of blocking on the browser main thread. The manager already delivers
//! emissions one at a time, but the handler may be shared between managers or read
//! from a test thread while logging continues, so it still locks.

use crate::emission::EmissionContext;
use crate::error::HandlerWriteError;
use crate::handler::Handler;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;
use wasm_safe_mutex::{Guard, Mutex};

/// A handler that stores emissions in memory.
///
/// # Example
///
/// ```rust
/// use linewise::{InMemoryHandler, Level, Manager};
/// use std::sync::Arc;
///
/// fn function_under_test(manager: &Manager) {
///     manager.write(Level::Warning, "Something suspicious happened\n");
///     linewise::error!(manager, "An error occurred: {code}", code = 404);
/// }
///
/// let manager = Manager::new("inmemory-doc");
/// let memory = Arc::new(InMemoryHandler::new());
/// manager.install_handler(memory.clone()).unwrap();
///
/// function_under_test(&manager);
///
/// assert_eq!(
///     memory.texts(),
///     ["Something suspicious happened", "An error occurred: 404"]
/// );
/// let logs = memory.drain_logs();
/// assert!(logs.contains("WARN"));
/// assert!(memory.records().is_empty());
/// ```
#[derive(Debug)]
pub struct InMemoryHandler {
    lines: Mutex<Vec<(EmissionContext, String)>>,
    literals: Mutex<Vec<Vec<u8>>>,
}

// ============================================================================
// BOILERPLATE TRAIT IMPLEMENTATIONS
// ============================================================================
//
// - Debug: Derived for diagnostic purposes and required by Handler
// - Default: Implemented with obvious zero-value (empty buffers)
// - Clone: NOT implemented - a clone would be a second handler that the Manager
//   cannot tell apart from the first by identity
// - PartialEq/Eq/Hash: NOT implemented - equality semantics unclear for handlers
// - Display: NOT implemented - no meaningful display representation
// - Send/Sync: Automatically implemented due to Mutex usage (required for Handler)

impl Default for InMemoryHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHandler {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            literals: Mutex::new(Vec::new()),
        }
    }

    fn lock_lines(&self) -> Guard<'_, Vec<(EmissionContext, String)>> {
        self.lines.lock_sync()
    }

    fn lock_literals(&self) -> Guard<'_, Vec<Vec<u8>>> {
        self.literals.lock_sync()
    }

    /// Every line received so far, with its context, in delivery order.
    pub fn records(&self) -> Vec<(EmissionContext, String)> {
        self.lock_lines().clone()
    }

    /// Just the text of every line received so far.
    pub fn texts(&self) -> Vec<String> {
        self.lock_lines()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Every literal received so far.
    pub fn literals(&self) -> Vec<Vec<u8>> {
        self.lock_literals().clone()
    }

    /// Drains all lines into a single string, prelude included, clearing the buffer.
    ///
    /// Lines are joined with newlines.  Literals are left alone.
    pub fn drain_logs(&self) -> String {
        let mut lines = self.lock_lines();
        let result = lines
            .iter()
            .map(|(ctx, text)| format!("{}{}", ctx.prelude(), text))
            .collect::<Vec<_>>()
            .join("\n");
        lines.clear();
        result
    }

    /// Writes all stored lines to the console, clearing the buffer.
    ///
    /// - On native platforms: lines are written to stderr using `eprintln!`
    /// - On WASM: lines are written using `web_sys::console::log_1`
    pub fn drain_to_console(&self) {
        let mut lines = self.lock_lines();
        for (ctx, text) in lines.iter() {
            #[cfg(target_arch = "wasm32")]
            web_sys::console::log_1(&format!("{}{}", ctx.prelude(), text).into());
            #[cfg(not(target_arch = "wasm32"))]
            eprintln!("{}{}", ctx.prelude(), text);
        }
        lines.clear();
    }

    /// Creates a future that periodically drains lines to the console.
    ///
    /// The future calls [`drain_to_console`](Self::drain_to_console) about every 100ms
    /// until `duration` has elapsed, then completes. This is useful in async
    /// environments where console access is restricted to one thread, such as
    /// WASM in a browser.
    ///
    /// ```
    /// use linewise::InMemoryHandler;
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// # async fn example() {
    /// let memory = Arc::new(InMemoryHandler::new());
    /// let drain_task = memory.periodic_drain_to_console(Duration::from_secs(5));
    /// // run alongside your actual async work, e.g. with select!/join!
    /// drain_task.await;
    /// # }
    /// ```
    pub fn periodic_drain_to_console(
        self: &Arc<Self>,
        duration: crate::Duration,
    ) -> impl Future<Output = ()> + use<> {
        PeriodicDrainToConsole {
            handler: self.clone(),
            duration,
            start_time: None,
        }
    }
}

impl Handler for InMemoryHandler {
    fn emit_line(&self, ctx: &EmissionContext, text: &str) -> Result<(), HandlerWriteError> {
        self.lock_lines().push((ctx.clone(), text.to_string()));
        Ok(())
    }

    fn emit_literal(&self, bytes: &[u8]) -> Result<(), HandlerWriteError> {
        self.lock_literals().push(bytes.to_vec());
        Ok(())
    }
}

/// Future returned by [`InMemoryHandler::periodic_drain_to_console`].
struct PeriodicDrainToConsole {
    handler: Arc<InMemoryHandler>,
    duration: crate::Duration,
    start_time: Option<crate::sys::Instant>,
}

impl Future for PeriodicDrainToConsole {
    type Output = ();

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        let start_time = match self.start_time {
            Some(t) => t,
            None => {
                let now = crate::sys::Instant::now();
                self.start_time = Some(now);
                now
            }
        };
        let finished = start_time.elapsed() >= self.duration;
        self.handler.drain_to_console();

        if finished {
            Poll::Ready(())
        } else {
            //empirically, if we do this inline in chrome, we will repeatedly poll the future
            //instead of interleaving with other tasks.
            let move_waker = cx.waker().clone();
            crate::sys::spawn_named("linewise-drain-waker", move || {
                #[cfg(not(target_arch = "wasm32"))]
                std::thread::sleep(std::time::Duration::from_millis(100));
                #[cfg(target_arch = "wasm32")]
                wasm_thread::sleep(std::time::Duration::from_millis(100));
                move_waker.wake();
            });
            Poll::Pending
        }
    }
}
