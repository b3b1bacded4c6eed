use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use smithay::output::Output;
use smithay::utils::{Physical, Rectangle};
use tracing::{trace, warn};

use crate::backend::{Executor, ScreenShooter};
use crate::buffer::GraphicBufferAllocator;
use crate::capture_area::CaptureArea;
use crate::frame::{FrameEventSink, FrameKey, ScreencopyFrame};
use crate::output::OutputExt;
use crate::registry::{self, LiveSet};
use crate::scene::{SceneChangeNotification, SurfaceStack};

/// Protocol version advertised by the global.
pub const VERSION: u32 = 3;

/// Capture areas a single client may accumulate before the list is wiped.
pub const DEFAULT_AREA_LIMIT: usize = 100;

thread_local! {
    static LIVE_MANAGERS: LiveSet<ScreencopyManager> = LiveSet::default();
}

fn resolve_manager(handle: u64) -> Option<Rc<ScreencopyManager>> {
    LIVE_MANAGERS.with(|live| live.resolve(handle))
}

/// Adapter context shared by every manager of one global.
pub struct ScreencopyCtx {
    pub executor: Arc<dyn Executor>,
    pub allocator: Arc<dyn GraphicBufferAllocator>,
    pub screen_shooter: Arc<dyn ScreenShooter>,
    pub surface_stack: Arc<dyn SurfaceStack>,
    /// Upper bound on per-client capture areas before the list is wiped;
    /// defaults to [`DEFAULT_AREA_LIMIT`].
    pub area_limit: usize,
}

/// Advertises the screencopy service; constructs one [`ScreencopyManager`]
/// per client bind.
pub struct ScreencopyManagerGlobal {
    ctx: Arc<ScreencopyCtx>,
}

impl ScreencopyManagerGlobal {
    pub fn new(
        executor: Arc<dyn Executor>,
        allocator: Arc<dyn GraphicBufferAllocator>,
        screen_shooter: Arc<dyn ScreenShooter>,
        surface_stack: Arc<dyn SurfaceStack>,
    ) -> Self {
        Self::with_ctx(Arc::new(ScreencopyCtx {
            executor,
            allocator,
            screen_shooter,
            surface_stack,
            area_limit: DEFAULT_AREA_LIMIT,
        }))
    }

    pub fn with_ctx(ctx: Arc<ScreencopyCtx>) -> Self {
        Self { ctx }
    }

    pub fn ctx(&self) -> &Arc<ScreencopyCtx> {
        &self.ctx
    }

    /// A client bound the global.
    pub fn bind(&self) -> Rc<ScreencopyManager> {
        ScreencopyManager::new(Arc::clone(&self.ctx))
    }
}

/// Per-client manager object.
///
/// Creates frames on request and, for frames that want to wait for damage,
/// keeps one [`CaptureArea`] per distinct frame key. The scene is only
/// observed once a client actually asks to wait, so one-shot `copy` clients
/// never pay the observer cost.
pub struct ScreencopyManager {
    handle: u64,
    ctx: Arc<ScreencopyCtx>,
    /// Frames waiting for damage before they are captured, plus keyed damage
    /// history for frames already captured.
    areas: RefCell<Vec<CaptureArea>>,
    /// Installed the first time a frame of this client calls
    /// `copy_with_damage`.
    change_notifier: RefCell<Option<Arc<SceneChangeNotification>>>,
}

impl ScreencopyManager {
    pub(crate) fn new(ctx: Arc<ScreencopyCtx>) -> Rc<Self> {
        let manager = Rc::new(Self {
            handle: registry::next_handle(),
            ctx,
            areas: RefCell::new(Vec::new()),
            change_notifier: RefCell::new(None),
        });
        LIVE_MANAGERS.with(|live| live.insert(manager.handle, &manager));
        manager
    }

    /// Handle a `capture_output` request. `overlay_cursor` is accepted and
    /// ignored.
    pub fn capture_output(
        self: &Rc<Self>,
        frame: Box<dyn FrameEventSink>,
        _overlay_cursor: i32,
        output: &Output,
    ) -> Rc<ScreencopyFrame> {
        let extents = output.extents();
        ScreencopyFrame::new(
            Arc::clone(&self.ctx),
            Rc::downgrade(self),
            FrameKey {
                region: extents,
                output: output.clone(),
            },
            frame,
        )
    }

    /// Handle a `capture_output_region` request, clamping the region to the
    /// output's extents.
    pub fn capture_output_region(
        self: &Rc<Self>,
        frame: Box<dyn FrameEventSink>,
        _overlay_cursor: i32,
        output: &Output,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Rc<ScreencopyFrame> {
        let extents = output.extents();
        let requested = Rectangle::new((x, y).into(), (width, height).into());
        // A region entirely outside the output is allowed; the zero-sized
        // intersection still gets validated against the client buffer.
        let region = requested.intersection(extents).unwrap_or_default();
        if region.size.w == 0 || region.size.h == 0 {
            trace!(?requested, "screencopy region does not intersect the output");
        }
        ScreencopyFrame::new(
            Arc::clone(&self.ctx),
            Rc::downgrade(self),
            FrameKey {
                region,
                output: output.clone(),
            },
            frame,
        )
    }

    /// Called by a frame whose client asked to copy with damage.
    ///
    /// The first frame of a key is captured immediately and leaves an empty
    /// area behind, so the next frame of that key waits for damage since this
    /// capture.
    pub(crate) fn maybe_wait_for_damage(&self, key: &FrameKey, frame: &Rc<ScreencopyFrame>) {
        if self.change_notifier.borrow().is_none() {
            self.create_change_notifier();
        }

        {
            let areas = self.areas.borrow();
            if let Some(area) = areas.iter().find(|area| area.key() == key) {
                area.add_frame(frame);
                return;
            }
        }

        frame.capture(None);
        let mut areas = self.areas.borrow_mut();
        areas.push(CaptureArea::new(key.clone()));
        if areas.len() > self.ctx.area_limit {
            // A client can mint distinct keys forever; dropping the damage
            // history only costs it a capture that does not wait for damage.
            warn!(count = areas.len(), "wiping screencopy capture areas");
            areas.clear();
        }
    }

    fn create_change_notifier(&self) {
        let notify = {
            let executor = Arc::clone(&self.ctx.executor);
            let manager_handle = self.handle;
            move |damage: Option<Rectangle<i32, Physical>>| {
                // Delivered on the scene's context; protocol state is only
                // touched back on the dispatch context.
                executor.spawn(Box::new(move || {
                    if let Some(manager) = resolve_manager(manager_handle) {
                        for area in manager.areas.borrow().iter() {
                            area.apply_damage(damage);
                        }
                    }
                }));
            }
        };
        let notifier = Arc::new(SceneChangeNotification::new(
            {
                let notify = notify.clone();
                move || notify(None)
            },
            move |_layer, damage| notify(Some(damage)),
        ));
        self.ctx.surface_stack.add_observer(Arc::clone(&notifier));
        *self.change_notifier.borrow_mut() = Some(notifier);
    }
}

impl Drop for ScreencopyManager {
    fn drop(&mut self) {
        if let Some(notifier) = self.change_notifier.borrow_mut().take() {
            self.ctx.surface_stack.remove_observer(&notifier);
        }
        LIVE_MANAGERS.with(|live| live.remove(self.handle));
        // `areas` drops after this body; each area drains its pending frame,
        // and only still-live frames resolve through the weak references.
    }
}
