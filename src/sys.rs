// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform-specific time and process queries.
//!
//! On native platforms the time types come from `std::time`, while on WASM they
//! come from `web_time`. [`Duration`] is re-exported at the crate root for use
//! with [`InMemoryHandler::periodic_drain_to_console`](crate::InMemoryHandler::periodic_drain_to_console).

#[cfg(not(target_arch = "wasm32"))]
pub use std::time::{Duration, Instant, SystemTime};
#[cfg(target_arch = "wasm32")]
pub use web_time::{Duration, Instant, SystemTime};

/// Identifier of the current process.
///
/// The browser has no process identifier, so WASM reports 0.
pub fn process_id() -> u32 {
    #[cfg(not(target_arch = "wasm32"))]
    {
        std::process::id()
    }
    #[cfg(target_arch = "wasm32")]
    {
        0
    }
}

/// Spawns a named background thread, ignoring spawn failures.
pub(crate) fn spawn_named<F>(name: &str, f: F)
where
    F: FnOnce() + Send + 'static,
{
    #[cfg(not(target_arch = "wasm32"))]
    let _ = std::thread::Builder::new().name(name.to_string()).spawn(f);

    #[cfg(target_arch = "wasm32")]
    {
        let _ = name;
        let _ = wasm_thread::spawn(f);
    }
}
