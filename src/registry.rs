// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide managers, one per named subsystem.
//!
//! A program usually wants every call site that logs for "storage" to share one
//! [`Manager`], with one handler set and one threshold, independent of the manager
//! for "network". This module keeps that map.
//!
//! # Lifecycle
//!
//! - **Init**: the first call to [`subsystem`] with a given name builds its manager
//!   from [`ManagerConfig::from_env`]. The manager then lives until the process exits.
//! - **Default subsystem**: [`global`] returns the subsystem named
//!   [`DEFAULT_SUBSYSTEM`]. It starts with a [`ConsoleHandler`] installed so logging
//!   works out-of-the-box; every other subsystem starts with no handlers.
//! - **Teardown**: [`shutdown_all`] removes every handler from every subsystem (see
//!   [`Manager::shutdown`]). The managers stay in the map and can be given new
//!   handlers.
//!
//! # Thread Safety
//!
//! The map sits behind a spinlock that is held only to look up or insert an
//! `Arc<Manager>`. Managers are built outside the lock.
//!
//! # Examples
//!
//! ```
//! use linewise::{InMemoryHandler, Level};
//! use std::sync::Arc;
//!
//! let storage = linewise::subsystem("registry-doc-storage");
//! let memory = Arc::new(InMemoryHandler::new());
//! storage.install_handler(memory.clone()).unwrap();
//!
//! // same name, same manager
//! linewise::subsystem("registry-doc-storage").write(Level::Error, "disk gone\n");
//! assert_eq!(memory.texts(), ["disk gone"]);
//!
//! // different name, independent handlers
//! assert_eq!(linewise::subsystem("registry-doc-network").handler_count(), 0);
//! ```

use crate::config::ManagerConfig;
use crate::console_handler::ConsoleHandler;
use crate::diagnostics::Diagnostic;
use crate::manager::Manager;
use crate::spinlock::Spinlock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Name of the subsystem returned by [`global`].
pub const DEFAULT_SUBSYSTEM: &str = "default";

static SUBSYSTEMS: OnceLock<Spinlock<HashMap<String, Arc<Manager>>>> = OnceLock::new();

fn subsystems_map() -> &'static Spinlock<HashMap<String, Arc<Manager>>> {
    SUBSYSTEMS.get_or_init(|| Spinlock::new(HashMap::new()))
}

/// The manager for `name`, built from the environment on first use.
pub fn subsystem(name: &str) -> Arc<Manager> {
    get_or_build(name, || ManagerConfig::from_env(name))
}

/**
The manager for `name`, built from `config` if this is the first use.

If the subsystem already exists, `config` is ignored and a [`Diagnostic::Config`] is
sent to `config.diagnostics` so the mistake does not pass silently.
*/
pub fn subsystem_with_config(name: &str, config: ManagerConfig) -> Arc<Manager> {
    let diagnostics = config.diagnostics.clone();
    let mut supplied = Some(config);
    let manager = get_or_build(name, || supplied.take().unwrap_or_default());
    if supplied.is_some() {
        diagnostics.deliver(Diagnostic::Config {
            subsystem: name.to_string(),
            message: "subsystem already exists; supplied config ignored".to_string(),
        });
    }
    manager
}

/// The [`DEFAULT_SUBSYSTEM`] manager.
pub fn global() -> Arc<Manager> {
    subsystem(DEFAULT_SUBSYSTEM)
}

fn get_or_build(name: &str, config: impl FnOnce() -> ManagerConfig) -> Arc<Manager> {
    if let Some(existing) = subsystems_map().with(|map| map.get(name).cloned()) {
        return existing;
    }
    let built = Arc::new(Manager::with_config(name, config()));
    if name == DEFAULT_SUBSYSTEM {
        // a fresh manager cannot already hold this handler, and the console needs no setup
        let _ = built.install_handler(Arc::new(ConsoleHandler::new()));
    }
    // another thread may have won the race while we were building
    subsystems_map().with(|map| map.entry(name.to_string()).or_insert(built).clone())
}

/// Names of every subsystem created so far, sorted.
pub fn subsystems() -> Vec<String> {
    let mut names: Vec<String> = subsystems_map().with(|map| map.keys().cloned().collect());
    names.sort();
    names
}

/// [`Manager::shutdown`] on every subsystem, in name order.
pub fn shutdown_all() {
    let mut managers: Vec<Arc<Manager>> =
        subsystems_map().with(|map| map.values().cloned().collect());
    managers.sort_by(|a, b| a.name().cmp(b.name()));
    for manager in managers {
        manager.shutdown();
    }
}
