// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-manager configuration.
//!
//! A [`ManagerConfig`] is consumed once, when a [`Manager`](crate::Manager) is built.
//! [`ManagerConfig::from_env`] is what [`subsystem`](crate::subsystem) uses:
//!
//! | Variable                  | Effect                                    |
//! |---------------------------|-------------------------------------------|
//! | `LINEWISE_LEVEL`          | threshold for every subsystem             |
//! | `LINEWISE_<NAME>_LEVEL`   | threshold for subsystem `<NAME>`, wins    |
//!
//! `<NAME>` is the subsystem name upper-cased with every non-alphanumeric character
//! replaced by `_`, so subsystem `net.http` reads `LINEWISE_NET_HTTP_LEVEL`.
//!
//! ```rust
//! use linewise::{Level, ManagerConfig};
//!
//! let config = ManagerConfig::default().with_threshold(Level::Warning);
//! assert_eq!(config.threshold, Level::Warning);
//! assert_eq!(ManagerConfig::env_key("net.http"), "LINEWISE_NET_HTTP_LEVEL");
//! ```

use crate::Level;
use crate::diagnostics::{Diagnostic, DiagnosticMode};

/// Name of the variable that sets the threshold of every subsystem.
pub const GLOBAL_LEVEL_VAR: &str = "LINEWISE_LEVEL";

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Emissions below this level are dropped before fan-out.
    pub threshold: Level,
    pub diagnostics: DiagnosticMode,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            diagnostics: DiagnosticMode::default(),
        }
    }
}

const fn default_threshold() -> Level {
    #[cfg(debug_assertions)]
    {
        Level::Debug
    }
    #[cfg(not(debug_assertions))]
    {
        Level::Info
    }
}

impl ManagerConfig {
    pub fn with_threshold(mut self, threshold: Level) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticMode) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// The subsystem-specific environment variable for `subsystem`.
    pub fn env_key(subsystem: &str) -> String {
        let mangled: String = subsystem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("LINEWISE_{}_LEVEL", mangled)
    }

    /**
    Defaults overridden by the environment.

    Unparseable values are reported to the diagnostics side channel and ignored.
    */
    pub fn from_env(subsystem: &str) -> Self {
        Self::from_lookup(subsystem, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(subsystem: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        for key in [GLOBAL_LEVEL_VAR.to_string(), Self::env_key(subsystem)] {
            let Some(value) = lookup(&key) else {
                continue;
            };
            match value.parse::<Level>() {
                Ok(level) => config.threshold = level,
                Err(e) => config.diagnostics.deliver(Diagnostic::Config {
                    subsystem: subsystem.to_string(),
                    message: format!("{}: {}", key, e),
                }),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn no_variables_gives_defaults() {
        let config = ManagerConfig::from_lookup("quiet", lookup(&[]));
        assert_eq!(config.threshold, default_threshold());
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn subsystem_variable_wins_over_global() {
        let config = ManagerConfig::from_lookup(
            "net.http",
            lookup(&[("LINEWISE_LEVEL", "error"), ("LINEWISE_NET_HTTP_LEVEL", "trace")]),
        );
        assert_eq!(config.threshold, Level::Trace);

        let config =
            ManagerConfig::from_lookup("storage", lookup(&[("LINEWISE_LEVEL", "error")]));
        assert_eq!(config.threshold, Level::Error);
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn invalid_value_is_ignored() {
        let config = ManagerConfig::from_lookup(
            "typo",
            lookup(&[("LINEWISE_LEVEL", "warning"), ("LINEWISE_TYPO_LEVEL", "loud")]),
        );
        assert_eq!(config.threshold, Level::Warning);
    }
}
