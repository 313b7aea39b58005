// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::Level;
use crate::emission::EmissionContext;
use crate::error::HandlerWriteError;
use crate::handler::Handler;
use wasm_safe_mutex::Mutex;

/// Which standard stream a [`ConsoleHandler`] writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConsoleTarget {
    #[default]
    Stderr,
    Stdout,
}

impl ConsoleTarget {
    fn name(self) -> &'static str {
        match self {
            ConsoleTarget::Stderr => "stderr",
            ConsoleTarget::Stdout => "stdout",
        }
    }
}

/**
A reference handler that writes to the console.

Each emission becomes one line: the [`EmissionContext::prelude`] followed by the text.
An emission is rendered completely before anything is written, and written while this
handler's lock is held, so two emissions never interleave their bytes. There is no
ordering guarantee relative to what other handlers write to the same terminal.

On WASM, lines go to the browser console at the method matching their level.
 */
#[derive(Debug)]
pub struct ConsoleHandler {
    target: ConsoleTarget,
    plain: bool,
    lock: Mutex<()>,
    #[cfg(test)]
    capture: Option<std::sync::Arc<Mutex<Vec<u8>>>>,
}

// ============================================================================
// BOILERPLATE TRAIT IMPLEMENTATIONS
// ============================================================================
//
// - Debug: Derived, required by Handler
// - Default: Implemented - stderr with prelude is the obvious console handler
// - Clone: NOT implemented - the Manager tells handlers apart by identity, and a
//   clone would be a second handler with its own lock over the same stream
// - PartialEq/Eq/Hash: NOT implemented - same reason
// - Send/Sync: Automatically implemented

impl Default for ConsoleHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleHandler {
    /// Writes to stderr.
    pub const fn new() -> Self {
        Self::with_target(ConsoleTarget::Stderr)
    }

    pub const fn with_target(target: ConsoleTarget) -> Self {
        Self {
            target,
            plain: false,
            lock: Mutex::new(()),
            #[cfg(test)]
            capture: None,
        }
    }

    /// A handler whose output lands in the returned buffer, one byte per write call.
    #[cfg(test)]
    pub(crate) fn capturing() -> (Self, std::sync::Arc<Mutex<Vec<u8>>>) {
        let buffer = std::sync::Arc::new(Mutex::new(Vec::new()));
        let mut handler = Self::new();
        handler.capture = Some(buffer.clone());
        (handler, buffer)
    }

    /// Omit the prelude and write only the text.
    pub fn plain(mut self) -> Self {
        self.plain = true;
        self
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }

    pub(crate) fn render(&self, ctx: &EmissionContext, text: &str) -> String {
        let mut line = if self.plain {
            String::with_capacity(text.len() + 1)
        } else {
            ctx.prelude()
        };
        line.push_str(text);
        line.push('\n');
        line
    }

    fn write_bytes(&self, level: Option<Level>, bytes: &[u8]) -> Result<(), HandlerWriteError> {
        let _guard = self.lock.lock_sync();
        #[cfg(not(target_arch = "wasm32"))]
        {
            use std::io::Write;
            let _ = level;
            #[cfg(test)]
            if let Some(capture) = &self.capture {
                return Trickle(capture)
                    .write_all(bytes)
                    .map_err(|e| HandlerWriteError::io("capture", e));
            }
            let result = match self.target {
                ConsoleTarget::Stderr => {
                    let mut lock = std::io::stderr().lock();
                    lock.write_all(bytes).and_then(|_| lock.flush())
                }
                ConsoleTarget::Stdout => {
                    let mut lock = std::io::stdout().lock();
                    lock.write_all(bytes).and_then(|_| lock.flush())
                }
            };
            result.map_err(|e| HandlerWriteError::io(self.target.name(), e))
        }
        #[cfg(target_arch = "wasm32")]
        {
            let msg = String::from_utf8_lossy(bytes);
            let msg = msg.trim_end_matches('\n');
            match level {
                Some(Level::Trace) => web_sys::console::trace_1(&msg.into()),
                Some(Level::Debug) => web_sys::console::debug_1(&msg.into()),
                Some(Level::Info) => web_sys::console::info_1(&msg.into()),
                Some(Level::Warning) => web_sys::console::warn_1(&msg.into()),
                Some(Level::Error) | Some(Level::Fatal) => web_sys::console::error_1(&msg.into()),
                None => web_sys::console::log_1(&msg.into()),
            }
            Ok(())
        }
    }
}

impl Handler for ConsoleHandler {
    fn emit_line(&self, ctx: &EmissionContext, text: &str) -> Result<(), HandlerWriteError> {
        let line = self.render(ctx, text);
        self.write_bytes(ctx.level(), line.as_bytes())
    }

    fn emit_literal(&self, bytes: &[u8]) -> Result<(), HandlerWriteError> {
        self.write_bytes(None, bytes)
    }

    fn emit_literal_with_context(
        &self,
        ctx: &EmissionContext,
        bytes: &[u8],
    ) -> Result<(), HandlerWriteError> {
        self.write_bytes(ctx.level(), bytes)
    }

    fn prepare_to_die(&self) -> Result<(), HandlerWriteError> {
        //nothing to do since we flush after every write
        Ok(())
    }
}

/// Test sink that accepts a single byte per call, so unserialized writers would interleave.
#[cfg(test)]
struct Trickle<'a>(&'a Mutex<Vec<u8>>);

#[cfg(test)]
impl std::io::Write for Trickle<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let Some(byte) = buf.first() else {
            return Ok(0);
        };
        self.0.lock_sync().push(*byte);
        std::thread::yield_now();
        Ok(1)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
