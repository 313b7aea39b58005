// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line accumulation: turning incremental writes into complete-line emissions.
//!
//! Call sites rarely produce a line in one piece. They write tokens, and a line is
//! only ready once a newline arrives. [`LineAccumulator`] holds the unfinished part;
//! the front ends built on it hand each finished line to a [`Manager`].
//!
//! There are two front ends:
//!
//! - [`LevelStream`], an owned handle bound to one manager and level. It implements
//!   [`std::fmt::Write`] and [`std::io::Write`], so it can be passed anywhere a
//!   generic writer is expected.
//! - [`Manager::write`] and [`Manager::flush`], which keep one accumulator per
//!   (manager, level) in thread-local storage.
//!
//! Neither needs a lock: every buffer belongs to exactly one owner.
//!
//! # Flush semantics
//!
//! A flush dispatches the buffered fragment with `is_line_complete == false` and
//! clears the buffer. The fragment is not prefixed to the next line.
//!
//! ```rust
//! use linewise::{InMemoryHandler, Level, Manager};
//! use std::sync::Arc;
//!
//! let manager = Manager::new("stream-doc");
//! let memory = Arc::new(InMemoryHandler::new());
//! manager.install_handler(memory.clone()).unwrap();
//!
//! let mut stream = manager.stream(Level::Info);
//! stream.write("A");
//! stream.write("B\n");
//! stream.write("C");
//! stream.flush();
//! stream.write("D\n");
//!
//! let seen: Vec<(String, bool)> = memory
//!     .records()
//!     .into_iter()
//!     .map(|(ctx, text)| (text, ctx.is_line_complete()))
//!     .collect();
//! assert_eq!(
//!     seen,
//!     [("AB".to_string(), true), ("C".to_string(), false), ("D".to_string(), true)]
//! );
//! ```
//!
//! A buffer that never sees a newline or a flush grows without bound; nothing is
//! truncated.

use crate::Level;
use crate::manager::Manager;
use std::cell::RefCell;
use std::collections::HashMap;

/**
A growable buffer that splits appended text into complete lines.
*/
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineAccumulator {
    buffer: String,
}

impl LineAccumulator {
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /**
    Appends `text` and returns every line it completed, newline stripped, in order.

    Only the appended text is scanned. Whatever follows the last newline stays
    buffered.
    */
    pub fn push(&mut self, text: &str) -> Vec<String> {
        let scan_from = self.buffer.len();
        self.buffer.push_str(text);
        let mut lines = Vec::new();
        let mut consumed = 0;
        for (offset, _) in self.buffer[scan_from..].match_indices('\n') {
            let end = scan_from + offset;
            lines.push(self.buffer[consumed..end].to_string());
            consumed = end + 1;
        }
        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        lines
    }

    /// Takes the buffered fragment, leaving the accumulator empty.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/**
An owned, level-tagged line buffer that dispatches into a [`Manager`].

Dropping a stream with a buffered fragment flushes it as a partial emission.

Handler failures never come back through a stream; they go to the manager's
diagnostics side channel.
*/
#[derive(Debug)]
pub struct LevelStream<'m> {
    manager: &'m Manager,
    level: Level,
    buffer: LineAccumulator,
    // trailing bytes of an incomplete UTF-8 sequence from io::Write
    pending_bytes: Vec<u8>,
}

impl<'m> LevelStream<'m> {
    pub(crate) fn new(manager: &'m Manager, level: Level) -> Self {
        Self {
            manager,
            level,
            buffer: LineAccumulator::new(),
            pending_bytes: Vec::new(),
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Appends `text`, dispatching each line it completes.
    pub fn write(&mut self, text: &str) {
        if !self.manager.enabled(self.level) {
            return;
        }
        for line in self.buffer.push(text) {
            self.manager.emit(self.level, &line, true);
        }
    }

    /// Dispatches the buffered fragment as a partial emission; no-op when empty.
    pub fn flush(&mut self) {
        if !self.pending_bytes.is_empty() {
            let bytes = std::mem::take(&mut self.pending_bytes);
            self.write(&String::from_utf8_lossy(&bytes));
        }
        if let Some(partial) = self.buffer.take_partial() {
            self.manager.emit(self.level, &partial, false);
        }
    }

    pub fn pending(&self) -> &str {
        self.buffer.pending()
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut joined;
        let bytes = if self.pending_bytes.is_empty() {
            bytes
        } else {
            joined = std::mem::take(&mut self.pending_bytes);
            joined.extend_from_slice(bytes);
            &joined[..]
        };
        let mut rest = bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.write(text);
                    return;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // SAFETY: from_utf8 validated this prefix
                    self.write(unsafe { std::str::from_utf8_unchecked(valid) });
                    match e.error_len() {
                        Some(len) => {
                            self.write(char::REPLACEMENT_CHARACTER.encode_utf8(&mut [0; 4]));
                            rest = &after[len..];
                        }
                        None => {
                            // incomplete sequence at the end; wait for more bytes
                            self.pending_bytes = after.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}

impl std::fmt::Write for LevelStream<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.write(s);
        Ok(())
    }
}

impl std::io::Write for LevelStream<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.manager.enabled(self.level) {
            self.write_bytes(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        LevelStream::flush(self);
        Ok(())
    }
}

impl Drop for LevelStream<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

thread_local! {
    static THREAD_BUFFERS: RefCell<HashMap<(u64, Level), LineAccumulator>> =
        RefCell::new(HashMap::new());
}

/// Runs `f` on this thread's accumulator for `(manager, level)`, dropping the entry
/// again once it is empty so finished managers do not leave buffers behind.
fn with_thread_buffer<R>(
    manager: &Manager,
    level: Level,
    f: impl FnOnce(&mut LineAccumulator) -> R,
) -> Option<R> {
    THREAD_BUFFERS
        .try_with(|buffers| {
            let mut buffers = buffers.borrow_mut();
            let key = (manager.id(), level);
            let accumulator = buffers.entry(key).or_default();
            let result = f(accumulator);
            if accumulator.is_empty() {
                buffers.remove(&key);
            }
            result
        })
        .ok()
}

pub(crate) fn thread_write(manager: &Manager, level: Level, text: &str) {
    // the borrow ends before dispatch, so a handler may write to this thread's buffers
    match with_thread_buffer(manager, level, |acc| acc.push(text)) {
        Some(lines) => {
            for line in lines {
                manager.emit(level, &line, true);
            }
        }
        // thread-local storage is being torn down; nothing can be buffered
        None => write_unbuffered(manager, level, text),
    }
}

/// Emits the complete lines of `text` and then its unterminated tail as a partial.
fn write_unbuffered(manager: &Manager, level: Level, text: &str) {
    let mut scratch = LineAccumulator::new();
    for line in scratch.push(text) {
        manager.emit(level, &line, true);
    }
    if let Some(tail) = scratch.take_partial() {
        manager.emit(level, &tail, false);
    }
}

pub(crate) fn thread_flush(manager: &Manager, level: Level) {
    if let Some(partial) = with_thread_buffer(manager, level, LineAccumulator::take_partial).flatten() {
        manager.emit(level, &partial, false);
    }
}

pub(crate) fn thread_pending(manager: &Manager, level: Level) -> String {
    with_thread_buffer(manager, level, |acc| acc.pending().to_string()).unwrap_or_default()
}
