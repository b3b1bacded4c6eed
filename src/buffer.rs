//! Contracts onto the compositor's buffer allocator.

use std::any::Any;
use std::sync::Arc;

use smithay::reexports::wayland_server::protocol::wl_shm;
use smithay::utils::{Physical, Size};
use thiserror::Error;

use crate::backend::Executor;

/// Returned when the allocator cannot adapt a client shm buffer.
#[derive(Debug, Error)]
#[error("out of memory adapting a client shm buffer")]
pub struct ShmAllocError;

/// Adapts wire-level shm buffers into [`GraphicsBuffer`]s.
// TODO: add a dmabuf adaptation entry point so frames can also target
// linux_dmabuf buffers instead of shm only.
pub trait GraphicBufferAllocator: Send + Sync {
    /// `buffer` is the client's `wl_buffer` as an opaque wire handle; the
    /// allocator downcasts it to whatever its display platform registered.
    /// `on_release` runs (through `executor`) once the server side no longer
    /// accesses the buffer.
    fn buffer_from_shm(
        &self,
        buffer: &dyn Any,
        executor: &Arc<dyn Executor>,
        on_release: Box<dyn FnOnce() + Send>,
    ) -> Result<Box<dyn GraphicsBuffer>, ShmAllocError>;
}

/// A client buffer adapted by the [`GraphicBufferAllocator`].
pub trait GraphicsBuffer {
    fn pixel_format(&self) -> wl_shm::Format;
    fn size(&self) -> Size<i32, Physical>;
    /// Bytes per row, as set up by the client.
    fn stride(&self) -> u32;
    /// Reinterpret as a CPU-writable mapping for the shooter to fill.
    ///
    /// Shm buffers always support this; `None` means the allocator broke its
    /// contract.
    fn into_write_mappable(self: Box<Self>) -> Option<Box<dyn WriteMappableBuffer>>;
}

/// Write-mappable view of a client buffer, the capture target handed to the
/// [`ScreenShooter`](crate::backend::ScreenShooter).
pub trait WriteMappableBuffer: Send {
    fn size(&self) -> Size<i32, Physical>;
    fn stride(&self) -> u32;
    fn map_writable(&mut self) -> &mut [u8];
}
