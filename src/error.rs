// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for handler registration and emission.
//!
//! - [`RegistryError`]: programmer errors reported synchronously by
//!   [`Manager::install_handler`](crate::Manager::install_handler) and
//!   [`Manager::remove_handler`](crate::Manager::remove_handler).
//! - [`HandlerWriteError`]: a single handler failed to record an emission.
//! - [`EmissionError`]: the input to a dispatch was malformed, or the dispatch
//!   could not run at all.
//! - [`HandlerFailure`] and [`DispatchReport`]: the aggregate result of one fan-out.
//!
//! Handler failures never escape the stream front end. They are collected into a
//! [`DispatchReport`] and forwarded to the diagnostics side channel.

use crate::manager::HandlerHandle;
use thiserror::Error;

/// Errors from installing or removing handlers.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The same handler instance is already installed in this manager.
    #[error("handler {handler} is already installed in {subsystem}")]
    Duplicate {
        subsystem: String,
        handler: String,
        existing: HandlerHandle,
    },
    /// The handle does not refer to a currently installed handler.
    #[error("{handle} is not installed in {subsystem}")]
    Unknown {
        subsystem: String,
        handle: HandlerHandle,
    },
    /// The handler's install hook could not acquire its sink.
    #[error("handler {handler} failed to install: {source}")]
    InstallFailed {
        handler: String,
        #[source]
        source: HandlerWriteError,
    },
    /// Called from inside a handler while this manager was dispatching to it.
    #[error("{subsystem} cannot change its handlers from inside a handler")]
    Reentrant { subsystem: String },
}

impl RegistryError {
    /// Short stable label for diagnostics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::Duplicate { .. } => "registry_duplicate_handler",
            RegistryError::Unknown { .. } => "registry_unknown_handler",
            RegistryError::InstallFailed { .. } => "registry_install_failed",
            RegistryError::Reentrant { .. } => "registry_reentrant",
        }
    }
}

/// A handler could not record an emission.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerWriteError {
    /// The sink returned an I/O error.
    #[error("{sink}: {source}")]
    Io {
        sink: String,
        #[source]
        source: std::io::Error,
    },
    /// The sink was already released.
    #[error("{sink} is closed")]
    Closed { sink: String },
    /// The handler panicked while emitting.
    #[error("handler panicked: {message}")]
    Panicked { message: String },
}

impl HandlerWriteError {
    pub fn io(sink: impl Into<String>, source: std::io::Error) -> Self {
        HandlerWriteError::Io {
            sink: sink.into(),
            source,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerWriteError::Io { .. } => "handler_io",
            HandlerWriteError::Closed { .. } => "handler_closed",
            HandlerWriteError::Panicked { .. } => "handler_panicked",
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        HandlerWriteError::Panicked { message }
    }
}

/// A dispatch was rejected before reaching any handler.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmissionError {
    /// A literal claimed more bytes than it supplied.
    #[error("literal length {length} exceeds the {available} bytes supplied")]
    InvalidLength { length: usize, available: usize },
    /// Emission text must be a single line; the terminator is added by each handler.
    #[error("emission text contains a newline at byte {offset}")]
    EmbeddedNewline { offset: usize },
    /// A handler tried to log into the manager that is currently dispatching to it.
    #[error("reentrant dispatch into {subsystem} from inside a handler")]
    Reentrant { subsystem: String },
}

impl EmissionError {
    pub fn as_label(&self) -> &'static str {
        match self {
            EmissionError::InvalidLength { .. } => "emission_invalid_length",
            EmissionError::EmbeddedNewline { .. } => "emission_embedded_newline",
            EmissionError::Reentrant { .. } => "emission_reentrant",
        }
    }
}

/// One handler's failure during a fan-out.
#[derive(Debug)]
pub struct HandlerFailure {
    /// `Debug` rendering of the handler.
    pub handler: String,
    pub handle: HandlerHandle,
    pub sequence_number: u64,
    pub error: HandlerWriteError,
}

impl std::fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) failed on emission #{}: {}",
            self.handler, self.handle, self.sequence_number, self.error
        )
    }
}

/**
The outcome of one dispatch.

A report with failures is an aggregate warning: the emission still reached every
other installed handler.
*/
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// `None` if the emission was filtered out by the threshold.
    pub sequence_number: Option<u64>,
    /// Handlers that recorded the emission without error.
    pub delivered: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    pub(crate) fn filtered() -> Self {
        Self::default()
    }

    pub fn was_filtered(&self) -> bool {
        self.sequence_number.is_none()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn panic_payloads_become_messages() {
        let err = HandlerWriteError::from_panic(Box::new("static message"));
        assert_eq!(err.to_string(), "handler panicked: static message");
        let err = HandlerWriteError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.to_string(), "handler panicked: owned");
        let err = HandlerWriteError::from_panic(Box::new(17_u32));
        assert_eq!(err.as_label(), "handler_panicked");
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn filtered_report_has_no_sequence() {
        let report = DispatchReport::filtered();
        assert!(report.was_filtered());
        assert!(report.is_clean());
        assert_eq!(report.delivered, 0);
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    fn invalid_length_message() {
        let err = EmissionError::InvalidLength {
            length: 10,
            available: 4,
        };
        assert_eq!(
            err.to_string(),
            "literal length 10 exceeds the 4 bytes supplied"
        );
        assert_eq!(err.as_label(), "emission_invalid_length");
    }
}
