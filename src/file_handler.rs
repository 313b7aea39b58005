// SPDX-License-Identifier: MIT OR Apache-2.0

//! A handler that appends emissions to a file.
//!
//! The file is opened for append (and created if missing) and held exclusively by the
//! handler until it is removed from its manager. Each emission is written as one line:
//! the [`EmissionContext::prelude`] followed by the text. Literals are written as-is.
//!
//! # Lifecycle
//!
//! | State     | Reached by                                             |
//! |-----------|--------------------------------------------------------|
//! | pending   | [`FileHandler::new`]                                   |
//! | open      | [`FileHandler::open`], or installing a pending handler |
//! | released  | removal from the last manager it was installed on       |
//!
//! The handler counts its installs, so one instance may be installed on several
//! managers; removing it from one leaves the file open for the others. Release
//! flushes and closes the file exactly once, and a failed final flush is returned
//! from [`Handler::on_remove`] so the manager can report it. Emissions that reach a
//! released handler report [`HandlerWriteError::Closed`]. Installing a released handler
//! again reopens the file for append.
//!
//! # Example
//!
//! ```rust
//! use linewise::{FileHandler, Level, Manager};
//! use std::sync::Arc;
//!
//! let dir = std::env::temp_dir().join(format!("linewise-doc-{}", std::process::id()));
//! std::fs::create_dir_all(&dir).unwrap();
//! let path = dir.join("app.log");
//!
//! let manager = Manager::new("file-doc");
//! let handle = manager.install_handler(Arc::new(FileHandler::new(&path))).unwrap();
//! manager.dispatch(Level::Info, "written to disk", true).unwrap();
//! manager.remove_handler(handle).unwrap();
//!
//! let contents = std::fs::read_to_string(&path).unwrap();
//! assert!(contents.ends_with("written to disk\n"));
//! # std::fs::remove_dir_all(&dir).unwrap();
//! ```

use crate::emission::EmissionContext;
use crate::error::HandlerWriteError;
use crate::handler::Handler;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use wasm_safe_mutex::{Guard, Mutex};

/// When a [`FileHandler`] pushes its buffer to the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlushPolicy {
    /// After every emission.
    #[default]
    EveryEmission,
    /// Only on [`Handler::prepare_to_die`], removal, or when the buffer fills.
    OnShutdown,
}

#[derive(Debug)]
enum Sink {
    Pending,
    Open(BufWriter<File>),
    Released,
}

#[derive(Debug)]
struct State {
    sink: Sink,
    // managers this handler is currently installed on
    installs: usize,
}

#[derive(Debug)]
pub struct FileHandler {
    path: PathBuf,
    policy: FlushPolicy,
    plain: bool,
    state: Mutex<State>,
}

impl FileHandler {
    /// A handler for `path`; the file is opened when the handler is installed.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            policy: FlushPolicy::default(),
            plain: false,
            state: Mutex::new(State {
                sink: Sink::Pending,
                installs: 0,
            }),
        }
    }

    /// Opens `path` immediately, so a bad path fails here rather than at install.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HandlerWriteError> {
        let handler = Self::new(path);
        let writer = handler.open_writer()?;
        handler.lock_state().sink = Sink::Open(writer);
        Ok(handler)
    }

    pub fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Omit the prelude and write only the text.
    pub fn plain(mut self) -> Self {
        self.plain = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file is currently held open.
    pub fn is_open(&self) -> bool {
        matches!(self.lock_state().sink, Sink::Open(_))
    }

    fn sink_name(&self) -> String {
        self.path.display().to_string()
    }

    fn lock_state(&self) -> Guard<'_, State> {
        self.state.lock_sync()
    }

    fn open_writer(&self) -> Result<BufWriter<File>, HandlerWriteError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map(BufWriter::new)
            .map_err(|e| HandlerWriteError::io(self.sink_name(), e))
    }

    fn write_with<F>(&self, write: F) -> Result<(), HandlerWriteError>
    where
        F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
    {
        let mut state = self.lock_state();
        let Sink::Open(writer) = &mut state.sink else {
            return Err(HandlerWriteError::Closed {
                sink: self.sink_name(),
            });
        };
        let result = write(&mut *writer).and_then(|_| match self.policy {
            FlushPolicy::EveryEmission => writer.flush(),
            FlushPolicy::OnShutdown => Ok(()),
        });
        result.map_err(|e| HandlerWriteError::io(self.sink_name(), e))
    }
}

impl Handler for FileHandler {
    fn emit_line(&self, ctx: &EmissionContext, text: &str) -> Result<(), HandlerWriteError> {
        let mut line = if self.plain {
            String::with_capacity(text.len() + 1)
        } else {
            ctx.prelude()
        };
        line.push_str(text);
        line.push('\n');
        self.write_with(|writer| writer.write_all(line.as_bytes()))
    }

    fn emit_literal(&self, bytes: &[u8]) -> Result<(), HandlerWriteError> {
        self.write_with(|writer| writer.write_all(bytes))
    }

    fn on_install(&self) -> Result<(), HandlerWriteError> {
        let mut state = self.lock_state();
        if !matches!(state.sink, Sink::Open(_)) {
            state.sink = Sink::Open(self.open_writer()?);
        }
        state.installs += 1;
        Ok(())
    }

    fn on_remove(&self) -> Result<(), HandlerWriteError> {
        let mut state = self.lock_state();
        state.installs = state.installs.saturating_sub(1);
        if state.installs > 0 {
            return Ok(());
        }
        match std::mem::replace(&mut state.sink, Sink::Released) {
            Sink::Open(mut writer) => writer
                .flush()
                .map_err(|e| HandlerWriteError::io(self.sink_name(), e)),
            Sink::Pending | Sink::Released => Ok(()),
        }
    }

    fn prepare_to_die(&self) -> Result<(), HandlerWriteError> {
        match &mut self.lock_state().sink {
            Sink::Open(writer) => writer
                .flush()
                .map_err(|e| HandlerWriteError::io(self.sink_name(), e)),
            Sink::Pending | Sink::Released => Ok(()),
        }
    }
}
