// SPDX-License-Identifier: MIT OR Apache-2.0

//! The metadata that travels with every emission.
//!
//! An [`EmissionContext`] is built by the [`Manager`](crate::Manager) at the moment a
//! buffered span is handed over for dispatch, while the registry lock is held. It is
//! never mutated afterwards; every installed handler receives a shared reference to the
//! same value, and it is dropped once the fan-out finishes.
//!
//! # Example
//!
//! ```rust
//! use linewise::{InMemoryHandler, Level, Manager};
//! use std::sync::Arc;
//!
//! let manager = Manager::new("emission-doc");
//! let memory = Arc::new(InMemoryHandler::new());
//! manager.install_handler(memory.clone()).unwrap();
//!
//! manager.dispatch(Level::Warning, "disk almost full", true).unwrap();
//!
//! let records = memory.records();
//! let (ctx, text) = &records[0];
//! assert_eq!(ctx.level(), Some(Level::Warning));
//! assert!(ctx.is_line_complete());
//! assert_eq!(ctx.sequence_number(), 0);
//! assert_eq!(text, "disk almost full");
//! ```

use crate::Level;
use crate::sys::{Duration, Instant, SystemTime};
use std::fmt::Display;
use std::sync::OnceLock;
use std::thread::ThreadId;

static INITIAL_TIMESTAMP: OnceLock<Instant> = OnceLock::new();

fn initial_timestamp() -> Instant {
    *INITIAL_TIMESTAMP.get_or_init(Instant::now)
}

/// A monotonic reading paired with the wall-clock time it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    monotonic: Instant,
    wall: SystemTime,
}

impl Timestamp {
    pub fn now() -> Self {
        // touch the epoch first so elapsed() never underflows
        initial_timestamp();
        Self {
            monotonic: Instant::now(),
            wall: SystemTime::now(),
        }
    }

    pub fn monotonic(&self) -> Instant {
        self.monotonic
    }

    pub fn wall(&self) -> SystemTime {
        self.wall
    }

    /// Time since the first timestamp taken in this process.
    pub fn elapsed_since_start(&self) -> Duration {
        self.monotonic.duration_since(initial_timestamp())
    }
}

/**
Describes one logical emission.

Handlers receive the context alongside the text of the emission. Two handlers that
receive the same emission receive the same context: nothing in it is per-handler.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionContext {
    level: Option<Level>,
    timestamp: Timestamp,
    thread_id: ThreadId,
    thread_name: Option<String>,
    process_id: u32,
    is_line_complete: bool,
    sequence_number: u64,
}

impl EmissionContext {
    pub(crate) fn new(level: Option<Level>, is_line_complete: bool, sequence_number: u64) -> Self {
        let current = std::thread::current();
        Self {
            level,
            timestamp: Timestamp::now(),
            thread_id: current.id(),
            thread_name: current.name().map(str::to_string),
            process_id: crate::sys::process_id(),
            is_line_complete,
            sequence_number,
        }
    }

    /// The level, or `None` for untagged literal output.
    pub fn level(&self) -> Option<Level> {
        self.level
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// `true` for a newline-terminated line, `false` for an explicit partial flush.
    pub fn is_line_complete(&self) -> bool {
        self.is_line_complete
    }

    /// Position of this emission in the total order of its manager.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /**
    The conventional prefix written by the built-in handlers:
    `[elapsed] LEVEL thread #seq: `, with ` (partial)` before the colon for an
    explicitly flushed fragment.
    */
    pub fn prelude(&self) -> String {
        self.to_string()
    }
}

impl Display for EmissionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] ", self.timestamp.elapsed_since_start())?;
        if let Some(level) = self.level {
            write!(f, "{} ", level)?;
        }
        match &self.thread_name {
            Some(name) => write!(f, "{}", name)?,
            None => write!(f, "{:?}", self.thread_id)?,
        }
        write!(f, " #{}", self.sequence_number)?;
        if !self.is_line_complete {
            f.write_str(" (partial)")?;
        }
        f.write_str(": ")
    }
}

/*
Boilerplate notes for EmissionContext:

- Clone: handlers that queue emissions for later need an owned copy
- PartialEq/Eq: lets tests compare what two handlers saw
- Hash, Ord: NOT implemented, SystemTime comparisons carry no ordering meaning here;
  use sequence_number
- Default: NOT implemented, a context only makes sense when minted by a Manager
*/

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn context_records_calling_thread() {
        let ctx = EmissionContext::new(Some(Level::Info), true, 7);
        assert_eq!(ctx.thread_id(), std::thread::current().id());
        assert_eq!(ctx.sequence_number(), 7);
        assert_eq!(ctx.process_id(), crate::sys::process_id());
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn prelude_contains_level_and_sequence() {
        let ctx = EmissionContext::new(Some(Level::Error), true, 42);
        let prelude = ctx.prelude();
        assert!(prelude.starts_with('['));
        assert!(prelude.contains("ERROR "));
        assert!(prelude.ends_with(" #42: "));
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn untagged_prelude_omits_level() {
        let ctx = EmissionContext::new(None, true, 0);
        for level in Level::ALL {
            assert!(!ctx.prelude().contains(level.as_str()));
        }
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn partial_prelude_is_marked() {
        let ctx = EmissionContext::new(Some(Level::Info), false, 3);
        assert!(ctx.prelude().ends_with(" #3 (partial): "));
    }

    #[test]
    fn named_thread_appears_in_prelude() {
        let prelude = std::thread::Builder::new()
            .name("prelude-worker".to_string())
            .spawn(|| EmissionContext::new(Some(Level::Info), true, 1).prelude())
            .unwrap()
            .join()
            .unwrap();
        assert!(prelude.contains("prelude-worker #1: "));
    }
}
