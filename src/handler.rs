//SPDX-License-Identifier: MIT OR Apache-2.0
use crate::emission::EmissionContext;
use crate::error::HandlerWriteError;
use std::fmt::Debug;

/**
A sink that records emissions.

Handlers are installed into a [`Manager`](crate::Manager) as `Arc<dyn Handler>`. The
manager calls them one at a time, in installation order, while it holds its registry
lock. A handler is still shared with its installer and may be called from any thread,
so it serializes writes to its own sink with its own lock.

Errors returned here are collected by the manager and never stop the fan-out to the
remaining handlers.
*/
pub trait Handler: Debug + Send + Sync {
    /**
    Records one emission.

    `text` never contains the terminating newline. When `ctx.is_line_complete()` is
    false, the text is a fragment that was flushed explicitly and the next emission
    does not continue it.
    */
    fn emit_line(&self, ctx: &EmissionContext, text: &str) -> Result<(), HandlerWriteError>;

    /**
    Records raw bytes with no implied structure, such as a banner.
    */
    fn emit_literal(&self, bytes: &[u8]) -> Result<(), HandlerWriteError>;

    /**
    Records raw bytes tagged with an emission context.

    The default ignores the context.
    */
    fn emit_literal_with_context(
        &self,
        ctx: &EmissionContext,
        bytes: &[u8],
    ) -> Result<(), HandlerWriteError> {
        let _ = ctx;
        self.emit_literal(bytes)
    }

    /**
    Called by [`Manager::install_handler`](crate::Manager::install_handler) before the
    handler becomes visible to dispatch.  Acquire sink resources here.
    */
    fn on_install(&self) -> Result<(), HandlerWriteError> {
        Ok(())
    }

    /**
    Called exactly once after the handler was removed from a manager.  No further
    emissions from that manager will arrive.

    A handler installed on several managers gets one call per removal, matching its
    [`on_install`](Handler::on_install) calls.  An error here (typically a failed final
    flush) is sent to the manager's diagnostics; the removal itself still happens.
    */
    fn on_remove(&self) -> Result<(), HandlerWriteError> {
        Ok(())
    }

    /**
    The application may imminently exit.  Ensure all buffers are flushed and up to date.
    */
    fn prepare_to_die(&self) -> Result<(), HandlerWriteError> {
        Ok(())
    }
}

/*
Boilerplate notes.

# Handler

Clone on a handler would duplicate a sink (two owners of one file), so no.
PartialEq is absent; the manager compares handlers by Arc identity.
Default is not sensible since who knows how the handler is constructed (does it need a path, etc.)
Send/Sync are required: the manager calls handlers from whichever thread dispatches.
*/
