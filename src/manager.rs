// SPDX-License-Identifier: MIT OR Apache-2.0

//! The handler registry and fan-out for one logging subsystem.
//!
//! A [`Manager`] owns an ordered list of installed [`Handler`]s. Every emission it
//! dispatches is delivered to each of them, in installation order, before `dispatch`
//! returns.
//!
//! # Ordering
//!
//! The registry `Mutex` is held for the whole fan-out. The sequence number of an
//! emission is assigned under that lock, so for a single manager:
//!
//! - sequence numbers start at 0 and increase by one per dispatch, with no gaps,
//!   regardless of which thread dispatched
//! - every handler observes emissions in sequence order
//! - [`Manager::remove_handler`] waits for an in-flight fan-out to finish, so once it
//!   returns the removed handler receives nothing further
//!
//! The cost is that a slow handler delays every thread logging to the same manager.
//! Each handler still has its own lock, so a handler that is shared between two
//! managers is only contended by those two.
//!
//! The registry lock is a [`wasm_safe_mutex::Mutex`]: it parks on native threads and
//! spins on the browser main thread, where blocking is not allowed.
//!
//! # Handlers that log
//!
//! A handler that logs into its own manager is refused with
//! [`EmissionError::Reentrant`]. Logging into a *different* manager is allowed, but the
//! handler graph must stay acyclic: if a handler of `a` logs to `b` while a handler of
//! `b` logs to `a`, two threads dispatching into `a` and `b` at once each hold one
//! registry lock and wait for the other, and neither returns.
//!
//! # Failure isolation
//!
//! A handler that returns an error, or panics, is recorded in the [`DispatchReport`]
//! and the fan-out continues with the next handler. Lifecycle hooks get the same
//! treatment: a failing or panicking [`on_remove`](Handler::on_remove) or
//! [`prepare_to_die`](Handler::prepare_to_die) becomes a [`Diagnostic::HookFailed`]
//! and the remaining handlers are still torn down. The front-end calls
//! ([`Manager::write`], [`LevelStream`](crate::LevelStream), the logging macros) never
//! surface these failures to their caller; they go to the manager's
//! [`DiagnosticMode`] instead.
//!
//! # Example
//!
//! ```rust
//! use linewise::{InMemoryHandler, Level, Manager};
//! use std::sync::Arc;
//!
//! let manager = Manager::new("manager-doc");
//! let first = Arc::new(InMemoryHandler::new());
//! let second = Arc::new(InMemoryHandler::new());
//! let first_handle = manager.install_handler(first.clone()).unwrap();
//! manager.install_handler(second.clone()).unwrap();
//!
//! // installing the same instance twice is a programmer error
//! assert!(manager.install_handler(first.clone()).is_err());
//!
//! let report = manager.dispatch(Level::Info, "hello", true).unwrap();
//! assert_eq!(report.delivered, 2);
//!
//! manager.remove_handler(first_handle).unwrap();
//! manager.dispatch(Level::Info, "only the second sees this", true).unwrap();
//! assert_eq!(first.texts(), ["hello"]);
//! assert_eq!(second.texts(), ["hello", "only the second sees this"]);
//! ```

use crate::Level;
use crate::config::ManagerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticMode};
use crate::emission::EmissionContext;
use crate::error::{DispatchReport, EmissionError, HandlerFailure, HandlerWriteError, RegistryError};
use crate::handler::Handler;
use crate::spinlock::Spinlock;
use crate::stream::{self, LevelStream};
use std::cell::RefCell;
use std::fmt::{Debug, Display};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use wasm_safe_mutex::{Guard, Mutex};

static MANAGER_ID: AtomicU64 = AtomicU64::new(0);

/// Opaque token returned by [`Manager::install_handler`].
///
/// A handle is only meaningful to the manager that issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandlerHandle {
    manager: u64,
    id: u64,
}

impl HandlerHandle {
    #[cfg(test)]
    pub(crate) fn for_tests(id: u64) -> Self {
        Self { manager: u64::MAX, id }
    }
}

impl Display for HandlerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handler#{}@manager#{}", self.id, self.manager)
    }
}

struct Installed {
    handle: HandlerHandle,
    handler: Arc<dyn Handler>,
}

struct Registry {
    handlers: Vec<Installed>,
    next_sequence: u64,
    next_handle: u64,
}

thread_local! {
    /// Managers this thread is currently inside of (dispatching or mutating).
    static ACTIVE: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Marks a manager as active on this thread until dropped.
struct ActiveScope {
    manager: u64,
}

impl ActiveScope {
    /// `None` if this thread is already inside `manager`.
    fn enter(manager: u64) -> Option<Self> {
        ACTIVE
            .try_with(|active| {
                let mut active = active.borrow_mut();
                if active.contains(&manager) {
                    None
                } else {
                    active.push(manager);
                    Some(ActiveScope { manager })
                }
            })
            // thread-local storage is gone during thread teardown; nothing can be active
            .unwrap_or(Some(ActiveScope { manager }))
    }
}

impl Drop for ActiveScope {
    fn drop(&mut self) {
        let _ = ACTIVE.try_with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|m| *m == self.manager) {
                active.remove(pos);
            }
        });
    }
}

/**
The handler registry for one logging subsystem.

Most programs get managers from [`subsystem`](crate::subsystem) so that every call
site naming the same subsystem shares one instance. A `Manager` built directly with
[`Manager::new`] is independent of that map, which is convenient for tests.
*/
pub struct Manager {
    id: u64,
    name: String,
    threshold: AtomicU8,
    registry: Mutex<Registry>,
    diagnostics: Spinlock<DiagnosticMode>,
}

impl Manager {
    /// A manager with the default configuration and no handlers.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, ManagerConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: ManagerConfig) -> Self {
        Self {
            id: MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            threshold: AtomicU8::new(config.threshold.as_u8()),
            registry: Mutex::new(Registry {
                handlers: Vec::new(),
                next_sequence: 0,
                next_handle: 0,
            }),
            diagnostics: Spinlock::new(config.diagnostics),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub fn threshold(&self) -> Level {
        Level::from_u8(self.threshold.load(Ordering::Relaxed))
    }

    pub fn set_threshold(&self, threshold: Level) {
        self.threshold.store(threshold.as_u8(), Ordering::Relaxed);
    }

    /// Whether an emission at `level` would reach the handlers.
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level.as_u8() >= self.threshold.load(Ordering::Relaxed)
    }

    pub fn set_diagnostics(&self, mode: DiagnosticMode) {
        *self.diagnostics.lock() = mode;
    }

    /// Shorthand for [`DiagnosticMode::Hook`], or back to the default reporter with `None`.
    pub fn set_diagnostic_hook(&self, hook: Option<Arc<dyn Fn(&Diagnostic) + Send + Sync>>) {
        self.set_diagnostics(match hook {
            Some(hook) => DiagnosticMode::Hook(hook),
            None => DiagnosticMode::Reporter,
        });
    }

    fn lock_registry(&self) -> Guard<'_, Registry> {
        self.registry.lock_sync()
    }

    /**
    Installs `handler` at the end of the dispatch order.

    The handler's [`on_install`](Handler::on_install) hook runs first, without the
    registry lock, so a slow sink does not hold up dispatch. If it fails or panics
    nothing is registered.

    # Errors

    - [`RegistryError::Duplicate`] if this exact instance is already installed
    - [`RegistryError::InstallFailed`] if the install hook failed
    - [`RegistryError::Reentrant`] if called from inside one of this manager's handlers
    */
    pub fn install_handler(&self, handler: Arc<dyn Handler>) -> Result<HandlerHandle, RegistryError> {
        let Some(_scope) = ActiveScope::enter(self.id) else {
            return Err(RegistryError::Reentrant {
                subsystem: self.name.clone(),
            });
        };
        let already = installed_handle(&self.lock_registry(), &handler);
        if let Some(existing) = already {
            return Err(self.duplicate(&handler, existing));
        }
        catch_unwind(AssertUnwindSafe(|| handler.on_install()))
            .unwrap_or_else(|payload| Err(HandlerWriteError::from_panic(payload)))
            .map_err(|source| RegistryError::InstallFailed {
                handler: format!("{:?}", handler),
                source,
            })?;

        let mut registry = self.lock_registry();
        // another thread may have installed the same instance while the hook ran
        if let Some(existing) = installed_handle(&registry, &handler) {
            drop(registry);
            self.run_hook("on_remove", existing, &handler, |h| h.on_remove());
            return Err(self.duplicate(&handler, existing));
        }
        let handle = HandlerHandle {
            manager: self.id,
            id: registry.next_handle,
        };
        registry.next_handle += 1;
        registry.handlers.push(Installed { handle, handler });
        Ok(handle)
    }

    fn duplicate(&self, handler: &Arc<dyn Handler>, existing: HandlerHandle) -> RegistryError {
        RegistryError::Duplicate {
            subsystem: self.name.clone(),
            handler: format!("{:?}", handler),
            existing,
        }
    }

    /**
    Detaches the handler behind `handle` and returns it.

    Blocks until any in-flight dispatch has finished. After this returns the handler
    receives no further emissions from this manager, and its
    [`on_remove`](Handler::on_remove) hook has run exactly once. A failure of that hook
    goes to the diagnostics side channel. The handler itself is not dropped here; the
    caller decides when it goes away.

    # Errors

    - [`RegistryError::Unknown`] if `handle` is not currently installed here
    - [`RegistryError::Reentrant`] if called from inside one of this manager's handlers
    */
    pub fn remove_handler(&self, handle: HandlerHandle) -> Result<Arc<dyn Handler>, RegistryError> {
        let Some(_scope) = ActiveScope::enter(self.id) else {
            return Err(RegistryError::Reentrant {
                subsystem: self.name.clone(),
            });
        };
        let removed = {
            let mut registry = self.lock_registry();
            let position = registry
                .handlers
                .iter()
                .position(|installed| installed.handle == handle)
                .ok_or_else(|| RegistryError::Unknown {
                    subsystem: self.name.clone(),
                    handle,
                })?;
            registry.handlers.remove(position).handler
        };
        self.run_hook("on_remove", handle, &removed, |h| h.on_remove());
        Ok(removed)
    }

    /// Runs a lifecycle hook with panics caught, reporting any failure as a diagnostic.
    fn run_hook<F>(&self, hook: &'static str, handle: HandlerHandle, handler: &Arc<dyn Handler>, call: F)
    where
        F: FnOnce(&dyn Handler) -> Result<(), HandlerWriteError>,
    {
        let result = catch_unwind(AssertUnwindSafe(|| call(handler.as_ref())))
            .unwrap_or_else(|payload| Err(HandlerWriteError::from_panic(payload)));
        if let Err(error) = result {
            self.diagnose(Diagnostic::HookFailed {
                subsystem: self.name.clone(),
                hook,
                handler: format!("{:?}", handler),
                handle,
                error,
            });
        }
    }

    /// Number of installed handlers.
    pub fn handler_count(&self) -> usize {
        self.lock_registry().handlers.len()
    }

    /// The installed handlers, in dispatch order.
    pub fn handlers(&self) -> Vec<(HandlerHandle, Arc<dyn Handler>)> {
        self.lock_registry()
            .handlers
            .iter()
            .map(|installed| (installed.handle, installed.handler.clone()))
            .collect()
    }

    /**
    Delivers one line (or explicitly flushed fragment) to every installed handler.

    `text` is one line without its terminator; each handler adds its own. Emissions
    below the threshold return a filtered report without taking the registry lock.

    # Errors

    - [`EmissionError::EmbeddedNewline`] if `text` contains `'\n'`
    - [`EmissionError::Reentrant`] when a handler of this manager dispatches into it

    Handler failures are not errors here; they are listed in the report.
    */
    pub fn dispatch(
        &self,
        level: Level,
        text: &str,
        is_line_complete: bool,
    ) -> Result<DispatchReport, EmissionError> {
        if let Some(offset) = text.find('\n') {
            return Err(EmissionError::EmbeddedNewline { offset });
        }
        if !self.enabled(level) {
            return Ok(DispatchReport::filtered());
        }
        self.fan_out(Some(level), is_line_complete, |handler, ctx| {
            handler.emit_line(ctx, text)
        })
    }

    /**
    Delivers the first `length` bytes of `bytes` as untagged raw output.

    Literals are not subject to the threshold.

    # Errors

    [`EmissionError::InvalidLength`] if `length` exceeds `bytes.len()`.
    */
    pub fn dispatch_literal(&self, length: usize, bytes: &[u8]) -> Result<DispatchReport, EmissionError> {
        let bytes = checked_prefix(length, bytes)?;
        self.fan_out(None, false, |handler, _| handler.emit_literal(bytes))
    }

    /// Like [`dispatch_literal`](Self::dispatch_literal) but tagged with a level and
    /// filtered by the threshold.
    pub fn dispatch_literal_with_level(
        &self,
        level: Level,
        length: usize,
        bytes: &[u8],
    ) -> Result<DispatchReport, EmissionError> {
        let bytes = checked_prefix(length, bytes)?;
        if !self.enabled(level) {
            return Ok(DispatchReport::filtered());
        }
        self.fan_out(Some(level), false, |handler, ctx| {
            handler.emit_literal_with_context(ctx, bytes)
        })
    }

    fn fan_out<F>(
        &self,
        level: Option<Level>,
        is_line_complete: bool,
        emit: F,
    ) -> Result<DispatchReport, EmissionError>
    where
        F: Fn(&dyn Handler, &EmissionContext) -> Result<(), HandlerWriteError>,
    {
        let Some(_scope) = ActiveScope::enter(self.id) else {
            return Err(EmissionError::Reentrant {
                subsystem: self.name.clone(),
            });
        };
        let mut registry = self.lock_registry();
        let sequence_number = registry.next_sequence;
        registry.next_sequence += 1;
        let ctx = EmissionContext::new(level, is_line_complete, sequence_number);

        let mut report = DispatchReport {
            sequence_number: Some(sequence_number),
            delivered: 0,
            failures: Vec::new(),
        };
        for installed in &registry.handlers {
            let result = catch_unwind(AssertUnwindSafe(|| emit(installed.handler.as_ref(), &ctx)))
                .unwrap_or_else(|payload| Err(HandlerWriteError::from_panic(payload)));
            match result {
                Ok(()) => report.delivered += 1,
                Err(error) => report.failures.push(HandlerFailure {
                    handler: format!("{:?}", installed.handler),
                    handle: installed.handle,
                    sequence_number,
                    error,
                }),
            }
        }
        Ok(report)
    }

    /// Sends a failed or rejected dispatch to the diagnostics side channel.
    pub(crate) fn report(&self, outcome: Result<DispatchReport, EmissionError>) {
        let diagnostic = match outcome {
            Ok(report) if report.is_clean() => return,
            Ok(report) => Diagnostic::HandlerFailures {
                subsystem: self.name.clone(),
                failures: report.failures,
            },
            Err(error) => Diagnostic::Rejected {
                subsystem: self.name.clone(),
                error,
            },
        };
        self.diagnose(diagnostic);
    }

    fn diagnose(&self, diagnostic: Diagnostic) {
        // clone first: a hook may call back into this manager
        let mode = self.diagnostics.lock().clone();
        mode.deliver(diagnostic);
    }

    /// [`dispatch`](Self::dispatch) for callers that must not see logging failures.
    pub fn emit(&self, level: Level, text: &str, is_line_complete: bool) {
        self.report(self.dispatch(level, text, is_line_complete));
    }

    /// [`dispatch_literal`](Self::dispatch_literal) for callers that must not see
    /// logging failures.
    pub fn literal(&self, length: usize, bytes: &[u8]) {
        self.report(self.dispatch_literal(length, bytes));
    }

    /// Writes a whole string as an untagged literal, such as a banner.
    pub fn banner(&self, text: &str) {
        self.literal(text.len(), text.as_bytes());
    }

    /**
    Appends `text` to this thread's buffer for `level`.

    Every complete line is dispatched; anything after the last newline stays buffered
    until a later newline or [`flush`](Self::flush). Other threads have their own
    buffers. Fragments still buffered when the thread exits are discarded, so flush
    before a thread finishes if the tail matters.
    */
    pub fn write(&self, level: Level, text: &str) {
        if !self.enabled(level) {
            return;
        }
        stream::thread_write(self, level, text);
    }

    /// Formats and writes one complete line to this thread's buffer for `level`.
    pub fn write_line(&self, level: Level, args: std::fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        let mut line = match args.as_str() {
            Some(s) => s.to_string(),
            None => args.to_string(),
        };
        line.push('\n');
        stream::thread_write(self, level, &line);
    }

    /// Dispatches this thread's buffered fragment for `level` as a partial emission.
    pub fn flush(&self, level: Level) {
        stream::thread_flush(self, level);
    }

    /// [`flush`](Self::flush) for every level, least severe first.
    pub fn flush_all(&self) {
        for level in Level::ALL {
            stream::thread_flush(self, level);
        }
    }

    /// What this thread has buffered for `level` and not yet dispatched.
    pub fn pending(&self, level: Level) -> String {
        stream::thread_pending(self, level)
    }

    /// An owned line buffer that dispatches into this manager at `level`.
    pub fn stream(&self, level: Level) -> LevelStream<'_> {
        LevelStream::new(self, level)
    }

    /// Asks every installed handler to flush its sink; failures go to diagnostics.
    pub fn prepare_to_die(&self) {
        for (handle, handler) in self.handlers() {
            self.run_hook("prepare_to_die", handle, &handler, |h| h.prepare_to_die());
        }
    }

    /**
    Removes every handler, in installation order.

    The calling thread's buffered fragments are flushed first. Each handler gets
    [`prepare_to_die`](Handler::prepare_to_die) and then
    [`on_remove`](Handler::on_remove), even if an earlier handler's hooks failed or
    panicked; those failures go to diagnostics. The manager stays usable; it simply
    has no handlers afterwards.
    */
    pub fn shutdown(&self) -> Vec<Arc<dyn Handler>> {
        self.flush_all();
        let removed: Vec<Installed> = std::mem::take(&mut self.lock_registry().handlers);
        removed
            .into_iter()
            .map(|installed| {
                let Installed { handle, handler } = installed;
                self.run_hook("prepare_to_die", handle, &handler, |h| h.prepare_to_die());
                self.run_hook("on_remove", handle, &handler, |h| h.on_remove());
                handler
            })
            .collect()
    }
}

fn same_handler(a: &Arc<dyn Handler>, b: &Arc<dyn Handler>) -> bool {
    // compare data pointers only; vtable pointers for one type may differ per codegen unit
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn installed_handle(registry: &Registry, handler: &Arc<dyn Handler>) -> Option<HandlerHandle> {
    registry
        .handlers
        .iter()
        .find(|installed| same_handler(&installed.handler, handler))
        .map(|installed| installed.handle)
}

fn checked_prefix(length: usize, bytes: &[u8]) -> Result<&[u8], EmissionError> {
    bytes.get(..length).ok_or(EmissionError::InvalidLength {
        length,
        available: bytes.len(),
    })
}

impl Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Manager");
        s.field("name", &self.name).field("threshold", &self.threshold());
        // try_lock: Debug may be called from inside a handler during dispatch
        match self.registry.try_lock() {
            Ok(registry) => s.field("handlers", &registry.handlers.len()),
            Err(_) => s.field("handlers", &"<busy>"),
        };
        s.finish()
    }
}

/*
Boilerplate notes for Manager:

- Clone: NOT implemented, two copies would have split registries; share with Arc
- PartialEq/Hash: NOT implemented, identity is what matters and Arc::ptr_eq covers it
- Default: NOT implemented, a manager needs a name
- Send/Sync: automatic, all state is behind atomics or locks
*/
