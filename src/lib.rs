//SPDX-License-Identifier: MIT OR Apache-2.0
/*!
# linewise

linewise is a line-oriented logging dispatch core.

Code writes text in pieces; linewise assembles the pieces into lines and delivers each
line, with its context, to every handler installed on a subsystem's [`Manager`].

# Development status

linewise is experimental and the API may change.

# The model

| Piece                | Role                                                                      |
|----------------------|---------------------------------------------------------------------------|
| [`Manager`]          | ordered handler registry for one subsystem; assigns sequence numbers     |
| [`Handler`]          | a sink: [`ConsoleHandler`], [`FileHandler`], [`InMemoryHandler`], or yours |
| [`EmissionContext`]  | level, timestamp, thread, process, completeness and sequence of a line   |
| [`LineAccumulator`]  | turns incremental writes into complete lines                              |
| [`LevelStream`]      | an owned writer bound to one manager and level                            |

Every emission is delivered to every installed handler, in installation order. A handler
that fails or panics is isolated: the others still receive the line and the caller never
sees the failure. It goes to the manager's [`DiagnosticMode`] instead.

# The API

```rust
use linewise::{InMemoryHandler, Level};
use std::sync::Arc;

let storage = linewise::subsystem("lib-doc-storage");
let memory = Arc::new(InMemoryHandler::new());
storage.install_handler(memory.clone()).unwrap();

storage.write(Level::Warning, "cache ");
storage.write(Level::Warning, "miss\n");
linewise::error!(storage, "disk {} unavailable", 3);

assert_eq!(memory.texts(), ["cache miss", "disk 3 unavailable"]);
```

[`global`] returns the `"default"` subsystem, which starts out writing to stderr.

# Configuration

Thresholds come from `LINEWISE_LEVEL` and `LINEWISE_<NAME>_LEVEL`; see [`ManagerConfig`].

# Multithreading

Managers are `Send + Sync` and are normally shared as `Arc<Manager>`. Buffered fragments
written with [`Manager::write`] are per thread, so two threads writing to the same
subsystem never splice their text into one line.
*/

mod config;
mod console_handler;
mod diagnostics;
mod emission;
mod error;
mod file_handler;
mod handler;
mod inmemory_handler;
mod level;
mod macros;
mod manager;
mod registry;
mod spinlock;
mod stream;
mod sys;

pub use config::{GLOBAL_LEVEL_VAR, ManagerConfig};
pub use console_handler::{ConsoleHandler, ConsoleTarget};
pub use diagnostics::{Diagnostic, DiagnosticMode};
pub use emission::{EmissionContext, Timestamp};
pub use error::{
    DispatchReport, EmissionError, HandlerFailure, HandlerWriteError, RegistryError,
};
pub use file_handler::{FileHandler, FlushPolicy};
pub use handler::Handler;
pub use inmemory_handler::InMemoryHandler;
pub use level::{Level, ParseLevelError};
pub use manager::{HandlerHandle, Manager};
pub use registry::{DEFAULT_SUBSYSTEM, global, shutdown_all, subsystem, subsystem_with_config, subsystems};
pub use stream::{LevelStream, LineAccumulator};

pub use sys::Duration;
