use smithay::utils::{Physical, Rectangle};

/// Damage accumulated against a capture area since its last capture.
///
/// Accumulation only moves up (`None` < `Partial` < `Full`) until a capture
/// resets the area to `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum DamageAmount {
    #[default]
    None,
    Partial(Rectangle<i32, Physical>),
    Full,
}

impl DamageAmount {
    /// Fold a damage rectangle (already clipped to the area) into the amount.
    pub fn merge(&mut self, rect: Rectangle<i32, Physical>) {
        *self = match *self {
            DamageAmount::Full => DamageAmount::Full,
            DamageAmount::Partial(prev) => DamageAmount::Partial(prev.merge(rect)),
            DamageAmount::None => DamageAmount::Partial(rect),
        };
    }
}
