//! Server side of the wlr-screencopy protocol (version 3).
//!
//! Clients ask for pixel copies of on-screen output regions into their own
//! shared-memory buffers, either immediately (`copy`) or once the region has
//! actually changed (`copy_with_damage`). The interesting part lives between
//! those two requests: a per-client engine that reconciles asynchronous damage
//! notifications from the scene with pending frames, captures each frame at
//! most once per damage epoch, and never lets a pending frame starve.
//!
//! This crate owns that engine, not the wire. The embedding compositor is
//! expected to provide a thin wrapper that decodes requests into calls on
//! [`ScreencopyManager`] / [`ScreencopyFrame`] and encodes events out of a
//! [`FrameEventSink`] implemented on its frame resources. Dropping the [`Rc`]
//! of a manager or frame is the engine-side equivalent of the wire resource
//! being destroyed.
//!
//! Everything else the engine needs from the compositor arrives through the
//! collaborator contracts in [`backend`], [`buffer`] and [`scene`]: an
//! executor for the wayland dispatch context, a screen shooter performing the
//! actual read-back, an allocator adapting client `wl_buffer`s, and the
//! surface stack's damage stream. All protocol state lives on the dispatch
//! context; the two asynchronous boundaries (shooter completion, scene
//! damage) re-enter it through [`backend::Executor::spawn`] carrying weak
//! handles, so a frame or manager destroyed in the meantime is silently
//! skipped.
//!
//! [`Rc`]: std::rc::Rc

pub mod backend;
pub mod buffer;
mod capture_area;
mod damage;
pub mod error;
pub mod frame;
pub mod manager;
pub mod output;
mod registry;
pub mod scene;
#[cfg(test)]
mod test_support;

pub use error::ProtocolError;
pub use frame::{FrameEventSink, FrameKey, ScreencopyFrame};
pub use manager::{
    ScreencopyCtx, ScreencopyManager, ScreencopyManagerGlobal, DEFAULT_AREA_LIMIT, VERSION,
};
pub use output::OutputExt;
