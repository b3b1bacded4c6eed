use smithay::output::Output;
use smithay::utils::{Physical, Rectangle};

/// Extension trait for an [`Output`].
pub trait OutputExt {
    /// The rectangle this output occupies in global compositor space, in
    /// physical pixels.
    ///
    /// Uses the output's advertised location and its current mode, transform
    /// and scale. An output without a mode has zero-sized extents.
    fn extents(&self) -> Rectangle<i32, Physical>;
}

impl OutputExt for Output {
    fn extents(&self) -> Rectangle<i32, Physical> {
        let scale = self.current_scale().fractional_scale();
        let logical_size = self
            .current_transform()
            .transform_size(
                self.current_mode()
                    .map(|mode| mode.size)
                    .unwrap_or_else(|| (0, 0).into()),
            )
            .to_f64()
            .to_logical(scale)
            .to_i32_round();
        Rectangle::new(self.current_location(), logical_size).to_physical_precise_round(scale)
    }
}
