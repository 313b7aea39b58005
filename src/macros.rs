// SPDX-License-Identifier: MIT OR Apache-2.0

//! Formatting front end for the per-thread line buffers.
//!
//! Each macro takes a manager (anything that dereferences to a
//! [`Manager`](crate::Manager): `&Manager`, `Arc<Manager>`, ...) followed by
//! `format!`-style arguments, and writes one complete line at its level.
//!
//! The threshold is checked before the arguments are formatted, so a filtered-out
//! emission costs one atomic load and a comparison. Arguments with side effects are
//! not evaluated either.
//!
//! ```rust
//! use linewise::{InMemoryHandler, Level, Manager};
//! use std::sync::Arc;
//!
//! let manager = Manager::new("macros-doc");
//! manager.set_threshold(Level::Info);
//! let memory = Arc::new(InMemoryHandler::new());
//! manager.install_handler(memory.clone()).unwrap();
//!
//! let mut evaluated = false;
//! linewise::debug!(manager, "{}", { evaluated = true; "expensive" });
//! linewise::info!(manager, "{} requests served", 3);
//!
//! assert!(!evaluated);
//! assert_eq!(memory.texts(), ["3 requests served"]);
//! ```

/// Whether `level` passes `manager`'s threshold.
#[macro_export]
macro_rules! log_enabled {
    ($manager:expr, $level:expr) => {
        $manager.enabled($level)
    };
}

/// Writes one formatted line at `level`.
#[macro_export]
macro_rules! log_line {
    ($manager:expr, $level:expr, $($arg:tt)+) => {{
        let manager = &$manager;
        let level: $crate::Level = $level;
        if manager.enabled(level) {
            manager.write_line(level, ::std::format_args!($($arg)+));
        }
    }};
}

#[macro_export]
macro_rules! trace {
    ($manager:expr, $($arg:tt)+) => {
        $crate::log_line!($manager, $crate::Level::Trace, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($manager:expr, $($arg:tt)+) => {
        $crate::log_line!($manager, $crate::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($manager:expr, $($arg:tt)+) => {
        $crate::log_line!($manager, $crate::Level::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! warning {
    ($manager:expr, $($arg:tt)+) => {
        $crate::log_line!($manager, $crate::Level::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($manager:expr, $($arg:tt)+) => {
        $crate::log_line!($manager, $crate::Level::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! fatal {
    ($manager:expr, $($arg:tt)+) => {
        $crate::log_line!($manager, $crate::Level::Fatal, $($arg)+)
    };
}

/// Writes formatted text as an untagged literal, such as a banner.
///
/// Literals bypass the line buffers and the threshold.
#[macro_export]
macro_rules! literal {
    ($manager:expr, $($arg:tt)+) => {
        $manager.banner(&::std::format!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use crate::config::ManagerConfig;
    use crate::diagnostics::DiagnosticMode;
    use crate::{InMemoryHandler, Level, Manager};
    use std::sync::Arc;

    fn setup() -> (Arc<Manager>, Arc<InMemoryHandler>) {
        let manager = Arc::new(Manager::with_config(
            "macros",
            ManagerConfig::default()
                .with_threshold(Level::Trace)
                .with_diagnostics(DiagnosticMode::Silent),
        ));
        let memory = Arc::new(InMemoryHandler::new());
        manager.install_handler(memory.clone()).unwrap();
        (manager, memory)
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn every_level_macro_tags_its_level() {
        let (manager, memory) = setup();
        crate::trace!(manager, "t");
        crate::debug!(manager, "d");
        crate::info!(manager, "i");
        crate::warning!(manager, "w");
        crate::error!(manager, "e");
        crate::fatal!(manager, "f");
        let levels: Vec<Option<Level>> = memory
            .records()
            .iter()
            .map(|(ctx, _)| ctx.level())
            .collect();
        let expected: Vec<Option<Level>> = Level::ALL.iter().copied().map(Some).collect();
        assert_eq!(levels, expected);
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn macro_completes_pending_fragment() {
        let (manager, memory) = setup();
        manager.write(Level::Info, "prefix: ");
        crate::info!(manager, "value={}", 7);
        assert_eq!(memory.texts(), ["prefix: value=7"]);
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn literal_macro_skips_buffers() {
        let (manager, memory) = setup();
        crate::literal!(manager, "== {} ==", "banner");
        assert_eq!(memory.literals(), [b"== banner ==".to_vec()]);
        assert!(memory.records().is_empty());
        assert!(crate::log_enabled!(manager, Level::Trace));
    }
}
