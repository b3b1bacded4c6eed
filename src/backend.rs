//! Contracts onto the compositor's capture machinery.

use std::time::Duration;

use smithay::utils::{Physical, Rectangle};

use crate::buffer::WriteMappableBuffer;

/// Posts tasks onto the wayland dispatch context.
///
/// Spawning is callable from any thread; the tasks themselves must only ever
/// run on the dispatch context, since they resolve protocol object handles
/// registered there. A task executed anywhere else finds nothing and does
/// nothing.
pub trait Executor: Send + Sync {
    fn spawn(&self, task: Box<dyn FnOnce() + Send>);
}

/// Reads back on-screen pixels into client buffers.
pub trait ScreenShooter: Send + Sync {
    /// Capture `region` (global coordinates) into `buffer`, then report the
    /// capture time, or `None` on failure.
    ///
    /// `on_done` may be invoked from any context; callers re-dispatch onto
    /// the wayland context before touching protocol state.
    fn capture(
        &self,
        buffer: Box<dyn WriteMappableBuffer>,
        region: Rectangle<i32, Physical>,
        on_done: Box<dyn FnOnce(Option<Duration>) + Send>,
    );
}
