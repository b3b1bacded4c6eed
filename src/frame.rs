use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use smithay::output::Output;
use smithay::reexports::wayland_server::protocol::wl_shm;
use smithay::utils::{Physical, Rectangle};
use tracing::trace;

use crate::buffer::WriteMappableBuffer;
use crate::error::ProtocolError;
use crate::manager::{ScreencopyCtx, ScreencopyManager};
use crate::registry::{self, LiveSet};

thread_local! {
    static LIVE_FRAMES: LiveSet<ScreencopyFrame> = LiveSet::default();
}

fn resolve_frame(handle: u64) -> Option<Rc<ScreencopyFrame>> {
    LIVE_FRAMES.with(|live| live.resolve(handle))
}

/// Capture target of a frame.
///
/// Frames with equal keys share damage tracking on their manager; two keys
/// are equal iff they name the same output (by identity) and the same region.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameKey {
    pub region: Rectangle<i32, Physical>,
    pub output: Output,
}

/// Typed event sender for one `zwlr_screencopy_frame_v1` resource.
///
/// The wire wrapper implements this on its frame resources. Events arrive in
/// protocol order: `buffer` (and `buffer_done`) at construction, then, after
/// a successful copy request, `flags`, optionally `damage`, and exactly one
/// of `ready` or `failed`.
pub trait FrameEventSink {
    fn buffer(&self, format: wl_shm::Format, width: u32, height: u32, stride: u32);
    /// End of buffer enumeration. Wrappers bound below protocol version 3
    /// drop this event.
    fn buffer_done(&self);
    fn flags(&self, y_invert: bool);
    /// Damage since the previous frame of the same key, in frame-local
    /// coordinates.
    fn damage(&self, x: u32, y: u32, width: u32, height: u32);
    fn ready(&self, sec_hi: u32, sec_lo: u32, nsec: u32);
    fn failed(&self);
}

#[derive(Default)]
struct FrameState {
    copy_called: bool,
    send_damage: bool,
    target: Option<Box<dyn WriteMappableBuffer>>,
}

/// A single client request for a pixel copy.
///
/// Announced to the client with a `buffer` event at construction; accepts one
/// `copy`/`copy_with_damage` in its lifetime and then reports exactly one of
/// `ready` or `failed` once the capture settles. The wire wrapper drops its
/// [`Rc`] when the client destroys the resource; a capture in flight at that
/// point completes into the void.
pub struct ScreencopyFrame {
    handle: u64,
    ctx: Arc<ScreencopyCtx>,
    manager: Weak<ScreencopyManager>,
    key: FrameKey,
    stride: u32,
    sink: Box<dyn FrameEventSink>,
    state: RefCell<FrameState>,
}

impl ScreencopyFrame {
    pub(crate) fn new(
        ctx: Arc<ScreencopyCtx>,
        manager: Weak<ScreencopyManager>,
        key: FrameKey,
        sink: Box<dyn FrameEventSink>,
    ) -> Rc<Self> {
        let width = key.region.size.w as u32;
        let height = key.region.size.h as u32;
        let stride = width * 4;
        sink.buffer(wl_shm::Format::Argb8888, width, height, stride);
        sink.buffer_done();

        let frame = Rc::new(Self {
            handle: registry::next_handle(),
            ctx,
            manager,
            key,
            stride,
            sink,
            state: RefCell::new(FrameState::default()),
        });
        LIVE_FRAMES.with(|live| live.insert(frame.handle, &frame));
        frame
    }

    /// The region this frame captures, in global coordinates.
    pub fn region(&self) -> Rectangle<i32, Physical> {
        self.key.region
    }

    /// The output this frame captures from.
    pub fn output(&self) -> &Output {
        &self.key.output
    }

    /// Handle a `copy` request: validate and take the client buffer, then
    /// capture immediately.
    pub fn copy(self: &Rc<Self>, buffer: &dyn Any) -> Result<(), ProtocolError> {
        self.prepare_target(buffer)?;
        self.capture(None);
        Ok(())
    }

    /// Handle a `copy_with_damage` request: validate and take the client
    /// buffer, then let the manager decide whether to wait for damage.
    pub fn copy_with_damage(self: &Rc<Self>, buffer: &dyn Any) -> Result<(), ProtocolError> {
        self.prepare_target(buffer)?;
        self.state.borrow_mut().send_damage = true;
        match self.manager.upgrade() {
            Some(manager) => manager.maybe_wait_for_damage(&self.key, self),
            // The manager is gone, so nothing tracks damage anymore; capture
            // immediately rather than hanging the client forever.
            None => self.capture(None),
        }
        Ok(())
    }

    fn prepare_target(&self, buffer: &dyn Any) -> Result<(), ProtocolError> {
        {
            let mut state = self.state.borrow_mut();
            if state.copy_called {
                return Err(ProtocolError::AlreadyUsed);
            }
            state.copy_called = true;
        }

        let graphics_buffer = self
            .ctx
            .allocator
            .buffer_from_shm(buffer, &self.ctx.executor, Box::new(|| ()))
            .map_err(|_| ProtocolError::OutOfMemory)?;

        let format = graphics_buffer.pixel_format();
        if format != wl_shm::Format::Argb8888 {
            return Err(ProtocolError::InvalidBuffer(format!(
                "invalid pixel format {format:?}"
            )));
        }
        let size = graphics_buffer.size();
        if size != self.key.region.size {
            return Err(ProtocolError::InvalidBuffer(format!(
                "invalid buffer size {}x{}, should be {}x{}",
                size.w, size.h, self.key.region.size.w, self.key.region.size.h
            )));
        }
        let stride = graphics_buffer.stride();
        if stride != self.stride {
            return Err(ProtocolError::InvalidBuffer(format!(
                "invalid stride {stride}, should be {}",
                self.stride
            )));
        }

        let target = graphics_buffer.into_write_mappable().unwrap_or_else(|| {
            panic!("failed to get a write-mappable view out of a wayland shm buffer")
        });
        self.state.borrow_mut().target = Some(target);
        Ok(())
    }

    /// Submit the capture to the screen shooter. Must not be called before a
    /// copy request provided a target.
    ///
    /// `damage` is what `report_result` relays to the client: a rectangle in
    /// global coordinates, or `None` for "the whole region changed".
    pub(crate) fn capture(self: &Rc<Self>, damage: Option<Rectangle<i32, Physical>>) {
        let target = self.state.borrow_mut().target.take();
        let Some(target) = target else {
            let copy_called = self.state.borrow().copy_called;
            panic!(
                "screencopy capture submitted without a target, copy {} been called",
                if copy_called { "has" } else { "has not" }
            );
        };

        let executor = Arc::clone(&self.ctx.executor);
        let frame_handle = self.handle;
        self.ctx.screen_shooter.capture(
            target,
            self.key.region,
            Box::new(move |captured_time| {
                // Possibly on the shooter's context; hop back to the dispatch
                // context, where the frame may or may not still be alive.
                executor.spawn(Box::new(move || {
                    if let Some(frame) = resolve_frame(frame_handle) {
                        frame.report_result(captured_time, damage);
                    }
                }));
            }),
        );
    }

    fn report_result(
        &self,
        captured_time: Option<Duration>,
        damage: Option<Rectangle<i32, Physical>>,
    ) {
        let Some(time) = captured_time else {
            trace!("screencopy capture failed");
            self.sink.failed();
            return;
        };

        self.sink.flags(true);

        if self.state.borrow().send_damage {
            let region = self.key.region;
            let damage_in_area = match damage {
                Some(rect) => rect
                    .intersection(region)
                    .unwrap_or_else(|| Rectangle::new(region.loc, (0, 0).into())),
                None => region,
            };
            let local = damage_in_area.loc - region.loc;
            self.sink.damage(
                local.x as u32,
                local.y as u32,
                damage_in_area.size.w as u32,
                damage_in_area.size.h as u32,
            );
        }

        let secs = time.as_secs();
        self.sink
            .ready((secs >> 32) as u32, (secs & 0xffff_ffff) as u32, time.subsec_nanos());
    }
}

impl Drop for ScreencopyFrame {
    fn drop(&mut self) {
        LIVE_FRAMES.with(|live| live.remove(self.handle));
    }
}
