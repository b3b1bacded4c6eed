use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use smithay::utils::{Physical, Rectangle};

use crate::damage::DamageAmount;
use crate::frame::{FrameKey, ScreencopyFrame};

/// Damage bookkeeping for one capture target of one client.
///
/// Accumulates damage against the key's region and holds at most one pending
/// frame, which is captured on the first damage of its epoch. An area without
/// a pending frame records that a previous frame of this key has been
/// captured, so the next one waits for damage since then.
pub(crate) struct CaptureArea {
    key: FrameKey,
    /// Damage since the last capture on this key. Stays `None` while no
    /// damage arrived, even with a frame pending.
    damage: Cell<DamageAmount>,
    /// The frame to capture once this area takes damage.
    pending: RefCell<Weak<ScreencopyFrame>>,
}

impl CaptureArea {
    pub fn new(key: FrameKey) -> Self {
        Self {
            key,
            damage: Cell::new(DamageAmount::None),
            pending: RefCell::new(Weak::new()),
        }
    }

    pub fn key(&self) -> &FrameKey {
        &self.key
    }

    /// Fold in damage (everything, if `damage` is absent) and capture the
    /// pending frame if any damage has now been seen.
    pub fn apply_damage(&self, damage: Option<Rectangle<i32, Physical>>) {
        let mut amount = self.damage.get();
        match damage {
            Some(rect) if amount != DamageAmount::Full => {
                let clipped = rect
                    .intersection(self.key.region)
                    .filter(|rect| rect.size.w > 0 && rect.size.h > 0);
                if let Some(clipped) = clipped {
                    amount.merge(clipped);
                }
            }
            // Absent damage means "everything changed"; and full damage
            // cannot grow further.
            _ => amount = DamageAmount::Full,
        }
        self.damage.set(amount);

        if amount != DamageAmount::None {
            self.capture_frame();
        }
    }

    /// Make `frame` the pending frame of this area.
    ///
    /// A frame still pending from before is captured now rather than being
    /// allowed to pile up; if damage has already been seen this epoch, the
    /// new frame is dispatched against it immediately.
    pub fn add_frame(&self, frame: &Rc<ScreencopyFrame>) {
        self.capture_frame();
        *self.pending.borrow_mut() = Rc::downgrade(frame);
        if self.damage.get() != DamageAmount::None {
            self.capture_frame();
        }
    }

    fn capture_frame(&self) {
        let Some(frame) = self.pending.borrow().upgrade() else {
            return;
        };

        match self.damage.get() {
            DamageAmount::None => {
                // No damage seen, but the caller wants a snapshot anyway.
                let sentinel = Rectangle::new(self.key.region.loc, (0, 0).into());
                frame.capture(Some(sentinel));
            }
            DamageAmount::Partial(rect) => frame.capture(Some(rect)),
            DamageAmount::Full => frame.capture(None),
        }

        self.damage.set(DamageAmount::None);
        *self.pending.borrow_mut() = Weak::new();
    }
}

impl Drop for CaptureArea {
    fn drop(&mut self) {
        // A pending frame must not be orphaned when its area goes away.
        self.capture_frame();
    }
}
