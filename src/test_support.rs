//! Deterministic stand-ins for the compositor-side collaborators.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use smithay::output::{Mode, Output, PhysicalProperties, Scale, Subpixel};
use smithay::reexports::wayland_server::protocol::wl_shm;
use smithay::utils::{Physical, Rectangle, Size, Transform};

use crate::backend::{Executor, ScreenShooter};
use crate::buffer::{GraphicBufferAllocator, GraphicsBuffer, ShmAllocError, WriteMappableBuffer};
use crate::frame::FrameEventSink;
use crate::manager::ScreencopyManagerGlobal;
use crate::scene::{SceneChangeNotification, SurfaceStack};

/// An output with the given mode size at the given location, scale 1.
pub(crate) fn test_output(size: (i32, i32), location: (i32, i32)) -> Output {
    let output = Output::new(
        String::from("screencopy-test-0"),
        PhysicalProperties {
            size: (0, 0).into(),
            subpixel: Subpixel::Unknown,
            make: String::from("test"),
            model: String::from("test"),
        },
    );
    let mode = Mode {
        size: size.into(),
        refresh: 60_000,
    };
    output.add_mode(mode);
    output.change_current_state(
        Some(mode),
        Some(Transform::Normal),
        Some(Scale::Integer(1)),
        Some(location.into()),
    );
    output
}

/// Queues tasks until the test pumps the "dispatch context".
#[derive(Clone, Default)]
pub(crate) struct TestExecutor {
    tasks: Arc<Mutex<VecDeque<Box<dyn FnOnce() + Send>>>>,
}

impl TestExecutor {
    /// Run queued tasks (and the tasks they queue) to completion.
    pub fn pump(&self) {
        loop {
            let task = self.tasks.lock().unwrap().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }
}

impl Executor for TestExecutor {
    fn spawn(&self, task: Box<dyn FnOnce() + Send>) {
        self.tasks.lock().unwrap().push_back(task);
    }
}

type CompletionFn = Box<dyn FnOnce(Option<Duration>) + Send>;

struct PendingCapture {
    region: Rectangle<i32, Physical>,
    #[allow(dead_code)]
    buffer: Box<dyn WriteMappableBuffer>,
    on_done: CompletionFn,
}

/// Records capture submissions and completes them on demand.
#[derive(Clone, Default)]
pub(crate) struct TestShooter {
    pending: Arc<Mutex<VecDeque<PendingCapture>>>,
}

impl TestShooter {
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Complete the oldest outstanding capture and return its region.
    pub fn complete_next(&self, captured_time: Option<Duration>) -> Rectangle<i32, Physical> {
        let capture = self
            .pending
            .lock()
            .unwrap()
            .pop_front()
            .expect("no outstanding capture to complete");
        (capture.on_done)(captured_time);
        capture.region
    }
}

impl ScreenShooter for TestShooter {
    fn capture(
        &self,
        buffer: Box<dyn WriteMappableBuffer>,
        region: Rectangle<i32, Physical>,
        on_done: Box<dyn FnOnce(Option<Duration>) + Send>,
    ) {
        self.pending.lock().unwrap().push_back(PendingCapture {
            region,
            buffer,
            on_done,
        });
    }
}

/// Stand-in for a client `wl_buffer`, as the wire wrapper would hand it over.
#[derive(Clone, Copy)]
pub(crate) struct TestShmBuffer {
    pub format: wl_shm::Format,
    pub size: Size<i32, Physical>,
    pub stride: u32,
}

impl TestShmBuffer {
    /// A well-formed argb8888 buffer of the given dimensions.
    pub fn argb(width: i32, height: i32) -> Self {
        Self {
            format: wl_shm::Format::Argb8888,
            size: (width, height).into(),
            stride: width as u32 * 4,
        }
    }
}

struct TestGraphicsBuffer {
    desc: TestShmBuffer,
}

impl GraphicsBuffer for TestGraphicsBuffer {
    fn pixel_format(&self) -> wl_shm::Format {
        self.desc.format
    }

    fn size(&self) -> Size<i32, Physical> {
        self.desc.size
    }

    fn stride(&self) -> u32 {
        self.desc.stride
    }

    fn into_write_mappable(self: Box<Self>) -> Option<Box<dyn WriteMappableBuffer>> {
        let len = self.desc.stride as usize * self.desc.size.h.max(0) as usize;
        Some(Box::new(TestMapping {
            size: self.desc.size,
            stride: self.desc.stride,
            data: vec![0; len],
        }))
    }
}

struct TestMapping {
    size: Size<i32, Physical>,
    stride: u32,
    data: Vec<u8>,
}

impl WriteMappableBuffer for TestMapping {
    fn size(&self) -> Size<i32, Physical> {
        self.size
    }

    fn stride(&self) -> u32 {
        self.stride
    }

    fn map_writable(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Adapts [`TestShmBuffer`] handles; anything else fails the adaptation.
#[derive(Clone, Default)]
pub(crate) struct TestAllocator;

impl GraphicBufferAllocator for TestAllocator {
    fn buffer_from_shm(
        &self,
        buffer: &dyn Any,
        _executor: &Arc<dyn Executor>,
        _on_release: Box<dyn FnOnce() + Send>,
    ) -> Result<Box<dyn GraphicsBuffer>, ShmAllocError> {
        let desc = buffer
            .downcast_ref::<TestShmBuffer>()
            .copied()
            .ok_or(ShmAllocError)?;
        Ok(Box::new(TestGraphicsBuffer { desc }))
    }
}

/// Fans damage out to registered observers on the caller's thread.
#[derive(Clone, Default)]
pub(crate) struct TestSurfaceStack {
    observers: Arc<Mutex<Vec<Arc<SceneChangeNotification>>>>,
}

impl TestSurfaceStack {
    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap().len()
    }

    pub fn damage(&self, rect: Rectangle<i32, Physical>) {
        let observers: Vec<_> = self.observers.lock().unwrap().clone();
        for observer in observers {
            observer.damaged(0, rect);
        }
    }

    pub fn change(&self) {
        let observers: Vec<_> = self.observers.lock().unwrap().clone();
        for observer in observers {
            observer.scene_changed();
        }
    }
}

impl SurfaceStack for TestSurfaceStack {
    fn add_observer(&self, observer: Arc<SceneChangeNotification>) {
        self.observers.lock().unwrap().push(observer);
    }

    fn remove_observer(&self, observer: &Arc<SceneChangeNotification>) {
        self.observers
            .lock()
            .unwrap()
            .retain(|candidate| !Arc::ptr_eq(candidate, observer));
    }
}

/// Everything a frame resource would have sent on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FrameEvent {
    Buffer {
        format: wl_shm::Format,
        width: u32,
        height: u32,
        stride: u32,
    },
    BufferDone,
    Flags {
        y_invert: bool,
    },
    Damage {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    Ready {
        sec_hi: u32,
        sec_lo: u32,
        nsec: u32,
    },
    Failed,
}

#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    events: Rc<RefCell<Vec<FrameEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<FrameEvent> {
        self.events.borrow().clone()
    }
}

impl FrameEventSink for RecordingSink {
    fn buffer(&self, format: wl_shm::Format, width: u32, height: u32, stride: u32) {
        self.events.borrow_mut().push(FrameEvent::Buffer {
            format,
            width,
            height,
            stride,
        });
    }

    fn buffer_done(&self) {
        self.events.borrow_mut().push(FrameEvent::BufferDone);
    }

    fn flags(&self, y_invert: bool) {
        self.events.borrow_mut().push(FrameEvent::Flags { y_invert });
    }

    fn damage(&self, x: u32, y: u32, width: u32, height: u32) {
        self.events.borrow_mut().push(FrameEvent::Damage {
            x,
            y,
            width,
            height,
        });
    }

    fn ready(&self, sec_hi: u32, sec_lo: u32, nsec: u32) {
        self.events.borrow_mut().push(FrameEvent::Ready {
            sec_hi,
            sec_lo,
            nsec,
        });
    }

    fn failed(&self) {
        self.events.borrow_mut().push(FrameEvent::Failed);
    }
}

/// The full collaborator set plus a global, wired together.
pub(crate) struct TestHarness {
    pub executor: TestExecutor,
    pub shooter: TestShooter,
    pub stack: TestSurfaceStack,
    pub global: ScreencopyManagerGlobal,
}

impl TestHarness {
    pub fn new() -> Self {
        let executor = TestExecutor::default();
        let shooter = TestShooter::default();
        let stack = TestSurfaceStack::default();
        let global = ScreencopyManagerGlobal::new(
            Arc::new(executor.clone()),
            Arc::new(TestAllocator),
            Arc::new(shooter.clone()),
            Arc::new(stack.clone()),
        );
        Self {
            executor,
            shooter,
            stack,
            global,
        }
    }
}
